//! Scripted router peer for console tests
//!
//! Answers the console's handshake, registrations, subscriptions and
//! session meta calls automatically. Tests push events and invocations
//! through [`FakeRouter`] and read back what the console called.

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use phi_wamp::memory::MemoryTransport;
use phi_wamp::message::{REGISTER, SUBSCRIBE};
use phi_wamp::{Message, Transport};

enum Inject {
    Publish { topic: String, args: Vec<Value> },
    Invoke { procedure: String, args: Vec<Value> },
    Hangup,
}

#[derive(Clone)]
pub struct FakeRouter {
    inject: mpsc::UnboundedSender<Inject>,
    calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    yields: Arc<Mutex<Vec<(u64, Value)>>>,
    subscribed: Arc<Mutex<Vec<String>>>,
}

impl FakeRouter {
    /// Serve `transport` with the given robots already joined
    pub fn spawn(transport: MemoryTransport, joined: Vec<(u64, &str)>) -> Self {
        Self::spawn_refusing(transport, joined, &[])
    }

    /// Like [`FakeRouter::spawn`], answering REGISTER or SUBSCRIBE for any
    /// name in `refused` with an ERROR
    pub fn spawn_refusing(
        mut transport: MemoryTransport,
        joined: Vec<(u64, &str)>,
        refused: &[&str],
    ) -> Self {
        let (inject, mut injected) = mpsc::unbounded_channel();
        let router = Self {
            inject,
            calls: Arc::new(Mutex::new(Vec::new())),
            yields: Arc::new(Mutex::new(Vec::new())),
            subscribed: Arc::new(Mutex::new(Vec::new())),
        };

        let sessions: HashMap<u64, String> = joined
            .into_iter()
            .map(|(id, authid)| (id, authid.to_string()))
            .collect();
        let refused: Vec<String> = refused.iter().map(|name| name.to_string()).collect();
        let state = router.clone();

        tokio::spawn(async move {
            let mut topics: HashMap<String, u64> = HashMap::new();
            let mut procedures: HashMap<String, u64> = HashMap::new();
            let mut next_id: u64 = 100;

            loop {
                let reply = tokio::select! {
                    incoming = transport.recv() => {
                        let Some(Ok(message)) = incoming else { break };
                        match message {
                            Message::Hello { .. } => Some(Message::Welcome {
                                session: 1,
                                details: Map::new(),
                            }),
                            Message::Register { request, procedure, .. }
                                if refused.contains(&procedure) =>
                            {
                                Some(refusal(REGISTER, request, "wamp.error.procedure_already_exists"))
                            }
                            Message::Subscribe { request, topic, .. } if refused.contains(&topic) => {
                                Some(refusal(SUBSCRIBE, request, "wamp.error.not_authorized"))
                            }
                            Message::Register { request, procedure, .. } => {
                                next_id += 1;
                                procedures.insert(procedure, next_id);
                                Some(Message::Registered { request, registration: next_id })
                            }
                            Message::Subscribe { request, topic, .. } => {
                                next_id += 1;
                                state.subscribed.lock().push(topic.clone());
                                topics.insert(topic, next_id);
                                Some(Message::Subscribed { request, subscription: next_id })
                            }
                            Message::Call { request, procedure, args, .. } => {
                                state.calls.lock().push((procedure.clone(), args.clone()));
                                let result = match procedure.as_str() {
                                    "wamp.session.list" => {
                                        let mut ids: Vec<u64> = sessions.keys().copied().collect();
                                        ids.sort();
                                        json!(ids)
                                    }
                                    "wamp.session.get" => {
                                        let id = args.first().and_then(Value::as_u64).unwrap_or(0);
                                        json!({"session": id, "authid": sessions.get(&id)})
                                    }
                                    _ => json!(true),
                                };
                                Some(Message::Result {
                                    request,
                                    details: Map::new(),
                                    args: vec![result],
                                    kwargs: Map::new(),
                                })
                            }
                            Message::Yield { request, args, .. } => {
                                let value = args.first().cloned().unwrap_or(Value::Null);
                                state.yields.lock().push((request, value));
                                None
                            }
                            Message::Goodbye { .. } => break,
                            _ => None,
                        }
                    }
                    Some(inject) = injected.recv() => match inject {
                        Inject::Publish { topic, args } => {
                            topics.get(&topic).map(|subscription| {
                                next_id += 1;
                                Message::Event {
                                    subscription: *subscription,
                                    publication: next_id,
                                    details: Map::new(),
                                    args,
                                    kwargs: Map::new(),
                                }
                            })
                        }
                        Inject::Invoke { procedure, args } => {
                            procedures.get(&procedure).map(|registration| {
                                next_id += 1;
                                Message::Invocation {
                                    request: next_id,
                                    registration: *registration,
                                    details: Map::new(),
                                    args,
                                    kwargs: Map::new(),
                                }
                            })
                        }
                        Inject::Hangup => break,
                    },
                };

                if let Some(reply) = reply {
                    if transport.send(reply).await.is_err() {
                        break;
                    }
                }
            }
        });

        router
    }

    pub fn publish(&self, topic: &str, args: Vec<Value>) {
        let _ = self.inject.send(Inject::Publish {
            topic: topic.to_string(),
            args,
        });
    }

    pub fn invoke(&self, procedure: &str, args: Vec<Value>) {
        let _ = self.inject.send(Inject::Invoke {
            procedure: procedure.to_string(),
            args,
        });
    }

    /// Drop the connection from the router side
    pub fn hangup(&self) {
        let _ = self.inject.send(Inject::Hangup);
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn yields(&self) -> Vec<Value> {
        self.yields.lock().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }
}

fn refusal(request_type: u64, request: u64, error: &str) -> Message {
    Message::Error {
        request_type,
        request,
        details: Map::new(),
        error: error.to_string(),
        args: Vec::new(),
        kwargs: Map::new(),
    }
}
