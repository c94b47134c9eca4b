//! Joined WAMP session
//!
//! [`join`] runs the HELLO/CHALLENGE/WELCOME handshake on a fresh
//! transport. [`drive`] then owns the transport for the life of the
//! session; everyone else talks to it through a cloneable
//! [`SessionHandle`].

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot, watch};

use crate::auth::Credentials;
use crate::error::{RemoteError, WampError};
use crate::message::{self, Message};
use crate::transport::Transport;
use crate::Result;

/// Successful RESULT payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallResult {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallResult {
    /// The single return value of a procedure (`null` when none)
    pub fn value(&self) -> Value {
        match self.args.len() {
            0 if !self.kwargs.is_empty() => Value::Object(self.kwargs.clone()),
            0 => Value::Null,
            1 => self.args[0].clone(),
            _ => Value::Array(self.args.clone()),
        }
    }
}

/// Publication delivered to a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub details: Map<String, Value>,
}

/// A call routed to one of our registered procedures
///
/// Exactly one of `reply`/`fail` should be used; dropping the invocation
/// unanswered sends `wamp.error.canceled` to the caller.
#[derive(Debug)]
pub struct Invocation {
    pub procedure: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    request: u64,
    outbox: Option<mpsc::UnboundedSender<Command>>,
}

impl Invocation {
    pub fn reply(mut self, args: Vec<Value>) {
        self.respond(Ok(args));
    }

    pub fn fail(mut self, uri: &str, message: &str) {
        self.respond(Err(RemoteError {
            uri: uri.to_string(),
            args: vec![json!(message)],
            kwargs: Map::new(),
        }));
    }

    fn respond(&mut self, outcome: std::result::Result<Vec<Value>, RemoteError>) {
        if let Some(outbox) = self.outbox.take() {
            let _ = outbox.send(Command::Yield {
                request: self.request,
                outcome,
            });
        }
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        self.respond(Err(RemoteError {
            uri: "wamp.error.canceled".to_string(),
            args: Vec::new(),
            kwargs: Map::new(),
        }));
    }
}

impl Invocation {
    /// An invocation outside any session; its answer lands in the returned queue
    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn detached(
        procedure: &str,
        args: Vec<Value>,
        request: u64,
    ) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let invocation = Self {
            procedure: procedure.to_string(),
            args,
            kwargs: Map::new(),
            request,
            outbox: Some(outbox),
        };
        (invocation, inbox)
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Call {
        procedure: String,
        args: Vec<Value>,
        reply: oneshot::Sender<Result<CallResult>>,
    },
    Subscribe {
        topic: String,
        events: mpsc::UnboundedSender<Event>,
        reply: oneshot::Sender<Result<u64>>,
    },
    Register {
        procedure: String,
        invocations: mpsc::UnboundedSender<Invocation>,
        reply: oneshot::Sender<Result<u64>>,
    },
    Yield {
        request: u64,
        outcome: std::result::Result<Vec<Value>, RemoteError>,
    },
}

/// Cloneable handle to an open session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    outbox: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<CallResult> {
        let (reply, rx) = oneshot::channel();
        self.outbox
            .send(Command::Call {
                procedure: procedure.to_string(),
                args,
                reply,
            })
            .map_err(|_| WampError::ConnectionLost)?;
        rx.await.map_err(|_| WampError::ConnectionLost)?
    }

    pub async fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<Event>> {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (reply, rx) = oneshot::channel();
        self.outbox
            .send(Command::Subscribe {
                topic: topic.to_string(),
                events,
                reply,
            })
            .map_err(|_| WampError::ConnectionLost)?;
        rx.await.map_err(|_| WampError::ConnectionLost)??;
        Ok(events_rx)
    }

    pub async fn register(&self, procedure: &str) -> Result<mpsc::UnboundedReceiver<Invocation>> {
        let (invocations, invocations_rx) = mpsc::unbounded_channel();
        let (reply, rx) = oneshot::channel();
        self.outbox
            .send(Command::Register {
                procedure: procedure.to_string(),
                invocations,
                reply,
            })
            .map_err(|_| WampError::ConnectionLost)?;
        rx.await.map_err(|_| WampError::ConnectionLost)??;
        Ok(invocations_rx)
    }
}

/// Perform the opening handshake; returns the session id
pub(crate) async fn join(
    transport: &mut dyn Transport,
    realm: &str,
    credentials: &Credentials,
) -> Result<u64> {
    let details = json!({
        "roles": {
            "caller": {},
            "callee": {},
            "subscriber": {},
            "publisher": {}
        },
        "authmethods": [credentials.method],
        "authid": credentials.authid,
    });

    transport
        .send(Message::Hello {
            realm: realm.to_string(),
            details: details.as_object().cloned().unwrap_or_default(),
        })
        .await?;

    loop {
        match transport.recv().await {
            Some(Ok(Message::Challenge { method, extra })) => {
                let signature = credentials.respond(&method, &extra)?;
                transport
                    .send(Message::Authenticate {
                        signature,
                        extra: Map::new(),
                    })
                    .await?;
            }
            Some(Ok(Message::Welcome { session, .. })) => {
                tracing::info!(session_id = session, realm = %realm, "Joined realm");
                return Ok(session);
            }
            Some(Ok(Message::Abort { details, reason })) => {
                let message = details
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Err(WampError::Aborted { reason, message });
            }
            Some(Ok(other)) => {
                return Err(WampError::Protocol(format!(
                    "unexpected message {} during handshake",
                    other.code()
                )));
            }
            Some(Err(e)) => return Err(e),
            None => return Err(WampError::ConnectionLost),
        }
    }
}

/// How a session driver stopped
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DriveExit {
    /// We said goodbye on request
    Left,
    /// Transport dropped or the router closed the session
    Lost(String),
}

pub(crate) fn channel(session: u64) -> (SessionHandle, mpsc::UnboundedReceiver<Command>) {
    let (outbox, inbox) = mpsc::unbounded_channel();
    (
        SessionHandle {
            id: session,
            outbox,
        },
        inbox,
    )
}

#[derive(Default)]
struct Pending {
    calls: HashMap<u64, oneshot::Sender<Result<CallResult>>>,
    subscribes: HashMap<u64, (String, mpsc::UnboundedSender<Event>, oneshot::Sender<Result<u64>>)>,
    registers: HashMap<u64, (String, mpsc::UnboundedSender<Invocation>, oneshot::Sender<Result<u64>>)>,
}

/// Run the session until it is left or lost
///
/// Owns the transport; in-flight calls fail with `ConnectionLost` when the
/// driver exits and subscription streams end.
pub(crate) async fn drive(
    mut transport: Box<dyn Transport>,
    handle: SessionHandle,
    mut inbox: mpsc::UnboundedReceiver<Command>,
    mut shutdown: watch::Receiver<bool>,
) -> DriveExit {
    // Invocations answer through the same queue as every other command
    let outbox = handle.outbox;

    let mut next_request: u64 = 0;
    let mut pending = Pending::default();
    let mut subscriptions: HashMap<u64, (String, mpsc::UnboundedSender<Event>)> = HashMap::new();
    let mut registrations: HashMap<u64, (String, mpsc::UnboundedSender<Invocation>)> =
        HashMap::new();

    let exit = loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = transport
                        .send(Message::Goodbye {
                            details: Map::new(),
                            reason: "wamp.close.system_shutdown".to_string(),
                        })
                        .await;
                    transport.close().await;
                    break DriveExit::Left;
                }
            }
            Some(command) = inbox.recv() => {
                let message = match command {
                    Command::Call { procedure, args, reply } => {
                        next_request += 1;
                        pending.calls.insert(next_request, reply);
                        Message::Call {
                            request: next_request,
                            options: Map::new(),
                            procedure,
                            args,
                            kwargs: Map::new(),
                        }
                    }
                    Command::Subscribe { topic, events, reply } => {
                        next_request += 1;
                        pending.subscribes.insert(next_request, (topic.clone(), events, reply));
                        Message::Subscribe {
                            request: next_request,
                            options: Map::new(),
                            topic,
                        }
                    }
                    Command::Register { procedure, invocations, reply } => {
                        next_request += 1;
                        pending
                            .registers
                            .insert(next_request, (procedure.clone(), invocations, reply));
                        Message::Register {
                            request: next_request,
                            options: Map::new(),
                            procedure,
                        }
                    }
                    Command::Yield { request, outcome } => match outcome {
                        Ok(args) => Message::Yield {
                            request,
                            options: Map::new(),
                            args,
                            kwargs: Map::new(),
                        },
                        Err(error) => Message::Error {
                            request_type: message::INVOCATION,
                            request,
                            details: Map::new(),
                            error: error.uri,
                            args: error.args,
                            kwargs: error.kwargs,
                        },
                    },
                };

                if let Err(e) = transport.send(message).await {
                    break DriveExit::Lost(e.to_string());
                }
            }
            incoming = transport.recv() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => break DriveExit::Lost(e.to_string()),
                    None => break DriveExit::Lost("lost".to_string()),
                };

                match message {
                    Message::Result { request, args, kwargs, .. } => {
                        if let Some(reply) = pending.calls.remove(&request) {
                            let _ = reply.send(Ok(CallResult { args, kwargs }));
                        }
                    }
                    Message::Error { request_type, request, error, args, kwargs, .. } => {
                        let remote = RemoteError { uri: error, args, kwargs };
                        match request_type {
                            message::CALL => {
                                if let Some(reply) = pending.calls.remove(&request) {
                                    let _ = reply.send(Err(WampError::Remote(remote)));
                                }
                            }
                            message::SUBSCRIBE => {
                                if let Some((_, _, reply)) = pending.subscribes.remove(&request) {
                                    let _ = reply.send(Err(WampError::Remote(remote)));
                                }
                            }
                            message::REGISTER => {
                                if let Some((_, _, reply)) = pending.registers.remove(&request) {
                                    let _ = reply.send(Err(WampError::Remote(remote)));
                                }
                            }
                            other => {
                                tracing::debug!(request_type = other, error = %remote, "Unhandled ERROR");
                            }
                        }
                    }
                    Message::Subscribed { request, subscription } => {
                        if let Some((topic, events, reply)) = pending.subscribes.remove(&request) {
                            tracing::debug!(topic = %topic, subscription, "Subscribed");
                            subscriptions.insert(subscription, (topic, events));
                            let _ = reply.send(Ok(subscription));
                        }
                    }
                    Message::Event { subscription, args, kwargs, details, .. } => {
                        let delivered = match subscriptions.get(&subscription) {
                            Some((topic, events)) => events
                                .send(Event { topic: topic.clone(), args, kwargs, details })
                                .is_ok(),
                            None => true,
                        };
                        if !delivered {
                            // Receiver dropped; stop routing to it
                            subscriptions.remove(&subscription);
                        }
                    }
                    Message::Registered { request, registration } => {
                        if let Some((procedure, invocations, reply)) = pending.registers.remove(&request) {
                            tracing::debug!(procedure = %procedure, registration, "Registered");
                            registrations.insert(registration, (procedure, invocations));
                            let _ = reply.send(Ok(registration));
                        }
                    }
                    Message::Invocation { request, registration, args, kwargs, .. } => {
                        let invocation = Invocation {
                            procedure: String::new(),
                            args,
                            kwargs,
                            request,
                            outbox: Some(outbox.clone()),
                        };
                        match registrations.get(&registration) {
                            Some((procedure, invocations)) => {
                                let mut invocation = invocation;
                                invocation.procedure = procedure.clone();
                                // A dropped receiver cancels through Invocation's Drop
                                let _ = invocations.send(invocation);
                            }
                            None => invocation.fail("wamp.error.no_such_registration", "no such registration"),
                        }
                    }
                    Message::Goodbye { reason, .. } => {
                        let _ = transport
                            .send(Message::Goodbye {
                                details: Map::new(),
                                reason: "wamp.close.goodbye_and_out".to_string(),
                            })
                            .await;
                        transport.close().await;
                        break DriveExit::Lost(reason);
                    }
                    Message::Abort { reason, .. } => break DriveExit::Lost(reason),
                    other => {
                        tracing::debug!(code = other.code(), "Ignoring unexpected message");
                    }
                }
            }
        }
    };

    for (_, reply) in pending.calls.drain() {
        let _ = reply.send(Err(WampError::ConnectionLost));
    }
    for (_, (_, _, reply)) in pending.subscribes.drain() {
        let _ = reply.send(Err(WampError::ConnectionLost));
    }
    for (_, (_, _, reply)) in pending.registers.drain() {
        let _ = reply.send(Err(WampError::ConnectionLost));
    }

    exit
}
