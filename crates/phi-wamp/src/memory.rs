//! In-process transports
//!
//! [`pair`] returns two connected ends; [`MemoryConnector`] hands out
//! pre-arranged client ends, one per connection attempt, so a peer task can
//! play the router side of a conversation. [`invocation`] builds a callee
//! invocation whose answer can be read back without a router.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{RemoteError, WampError};
use crate::message::Message;
use crate::session::{Command, Invocation};
use crate::transport::{Connector, Transport};
use crate::Result;

#[derive(Debug)]
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<Message>>,
    rx: mpsc::UnboundedReceiver<Message>,
}

/// Two connected transport ends
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    (
        MemoryTransport {
            tx: Some(a_tx),
            rx: a_rx,
        },
        MemoryTransport {
            tx: Some(b_tx),
            rx: b_rx,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, message: Message) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(WampError::ConnectionLost)?;
        tx.send(message).map_err(|_| WampError::ConnectionLost)
    }

    async fn recv(&mut self) -> Option<Result<Message>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

/// Connector whose attempts are scripted in advance
///
/// Each `connect` pops the next entry: `Ok(end)` succeeds, `Err(reason)`
/// fails as an unreachable endpoint. An empty script is unreachable.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    script: Arc<Mutex<VecDeque<std::result::Result<MemoryTransport, String>>>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reachable endpoint; returns the router-side end
    pub fn accept(&self) -> MemoryTransport {
        let (client, router) = pair();
        self.script.lock().push_back(Ok(client));
        router
    }

    /// Queue an unreachable attempt
    pub fn refuse(&self, reason: &str) {
        self.script.lock().push_back(Err(reason.to_string()));
    }

    /// URLs of every connect attempt so far
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        self.attempts.lock().push(url.to_string());

        match self.script.lock().pop_front() {
            Some(Ok(transport)) => Ok(Box::new(transport)),
            Some(Err(reason)) => Err(WampError::Transport(reason)),
            None => Err(WampError::Transport("connection refused".to_string())),
        }
    }
}

/// Answers given to a detached [`Invocation`]
pub struct Replies {
    inbox: mpsc::UnboundedReceiver<Command>,
}

impl Replies {
    /// The answer, once `reply`, `fail` or drop has happened
    pub fn try_next(&mut self) -> Option<std::result::Result<Vec<Value>, RemoteError>> {
        match self.inbox.try_recv().ok()? {
            Command::Yield { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// An invocation of `procedure` with no session behind it
pub fn invocation(procedure: &str, args: Vec<Value>) -> (Invocation, Replies) {
    let (invocation, inbox) = Invocation::detached(procedure, args, 1);
    (invocation, Replies { inbox })
}
