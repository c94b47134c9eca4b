//! Operator decisions
//!
//! Robots ask the operator yes/no questions by calling
//! `zeus.phi.basic_decision(header, content)`. Each invocation waits here
//! until the operator answers; the answer is the RPC result.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

use phi_log::{LogSink, SYSTEM_CHANNEL};
use phi_wamp::Invocation;

use crate::error::CoreError;
use crate::Result;

/// What the operator sees of a pending question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDecision {
    pub id: u64,
    pub header: String,
    pub content: String,
}

struct Waiting {
    decision: PendingDecision,
    invocation: Invocation,
}

struct Queue {
    next_id: u64,
    waiting: VecDeque<Waiting>,
}

pub struct DecisionQueue {
    queue: Arc<Mutex<Queue>>,
    sink: LogSink,
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl DecisionQueue {
    pub fn new(sink: LogSink) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue {
                next_id: 1,
                waiting: VecDeque::new(),
            })),
            sink,
        }
    }

    /// Queue an incoming decision request
    pub fn request(&self, invocation: Invocation) -> PendingDecision {
        let decision = {
            let mut queue = self.queue.lock();
            let decision = PendingDecision {
                id: queue.next_id,
                header: text(invocation.args.first()),
                content: text(invocation.args.get(1)),
            };
            queue.next_id += 1;
            queue.waiting.push_back(Waiting {
                decision: decision.clone(),
                invocation,
            });
            decision
        };

        tracing::info!(decision_id = decision.id, header = %decision.header, "Decision requested");
        self.sink
            .debug(SYSTEM_CHANNEL, "A user decision has been requested.");
        decision
    }

    /// Answer the oldest pending decision
    pub fn resolve(&self, answer: bool) -> Result<PendingDecision> {
        let waiting = self
            .queue
            .lock()
            .waiting
            .pop_front()
            .ok_or(CoreError::NoPendingDecision)?;

        waiting.invocation.reply(vec![json!(answer)]);

        tracing::info!(decision_id = waiting.decision.id, answer, "Decision resolved");
        self.sink
            .debug(SYSTEM_CHANNEL, "A user decision has been resolved.");
        Ok(waiting.decision)
    }

    /// Pending decisions, oldest first
    pub fn pending(&self) -> Vec<PendingDecision> {
        self.queue
            .lock()
            .waiting
            .iter()
            .map(|w| w.decision.clone())
            .collect()
    }

    /// Drop every pending decision; their callers see a cancellation
    pub fn discard(&self) -> usize {
        let dropped: Vec<Waiting> = self.queue.lock().waiting.drain(..).collect();
        if !dropped.is_empty() {
            tracing::info!(count = dropped.len(), "Discarded pending decisions");
        }
        dropped.len()
    }
}

impl Clone for DecisionQueue {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            sink: self.sink.clone(),
        }
    }
}
