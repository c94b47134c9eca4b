//! Recording caller
//!
//! A [`RemoteCaller`] that records every call and answers from a queue of
//! scripted replies. Unscripted calls succeed with `true`.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};

use phi_wamp::{CallResult, RemoteError, WampError};

use crate::router::RemoteCaller;

#[derive(Default)]
pub struct RecordingCaller {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    replies: Mutex<VecDeque<phi_wamp::Result<CallResult>>>,
    /// Standing replies per procedure, used when the queue is empty
    procedures: Mutex<HashMap<String, Value>>,
}

impl RecordingCaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next call returns `value`
    pub fn returns(&self, value: Value) {
        self.replies.lock().push_back(Ok(CallResult {
            args: vec![value],
            kwargs: Map::new(),
        }));
    }

    /// Next call fails with a remote error
    pub fn fails(&self, uri: &str, message: &str) {
        self.replies
            .lock()
            .push_back(Err(WampError::Remote(RemoteError {
                uri: uri.to_string(),
                args: vec![json!(message)],
                kwargs: Map::new(),
            })));
    }

    /// Every call to `procedure` returns `value` unless a queued reply is pending
    pub fn answer(&self, procedure: &str, value: Value) {
        self.procedures.lock().insert(procedure.to_string(), value);
    }

    /// `(procedure, args)` for each call so far
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn procedures_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl RemoteCaller for RecordingCaller {
    async fn call(&self, procedure: &str, args: Vec<Value>) -> phi_wamp::Result<CallResult> {
        self.calls.lock().push((procedure.to_string(), args));

        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }

        let value = self
            .procedures
            .lock()
            .get(procedure)
            .cloned()
            .unwrap_or(json!(true));
        Ok(CallResult {
            args: vec![value],
            kwargs: Map::new(),
        })
    }
}
