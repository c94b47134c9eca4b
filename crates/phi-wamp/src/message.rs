//! WAMP v2 messages and their JSON array encoding
//!
//! Only the subset a caller/callee/subscriber client needs. Every message
//! is a JSON array whose first element is the type code.

use serde_json::{json, Map, Value};

use crate::error::WampError;
use crate::Result;

pub const HELLO: u64 = 1;
pub const WELCOME: u64 = 2;
pub const ABORT: u64 = 3;
pub const CHALLENGE: u64 = 4;
pub const AUTHENTICATE: u64 = 5;
pub const GOODBYE: u64 = 6;
pub const ERROR: u64 = 8;
pub const SUBSCRIBE: u64 = 32;
pub const SUBSCRIBED: u64 = 33;
pub const EVENT: u64 = 36;
pub const CALL: u64 = 48;
pub const RESULT: u64 = 50;
pub const REGISTER: u64 = 64;
pub const REGISTERED: u64 = 65;
pub const INVOCATION: u64 = 68;
pub const YIELD: u64 = 70;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello {
        realm: String,
        details: Map<String, Value>,
    },
    Welcome {
        session: u64,
        details: Map<String, Value>,
    },
    Abort {
        details: Map<String, Value>,
        reason: String,
    },
    Challenge {
        method: String,
        extra: Map<String, Value>,
    },
    Authenticate {
        signature: String,
        extra: Map<String, Value>,
    },
    Goodbye {
        details: Map<String, Value>,
        reason: String,
    },
    Error {
        request_type: u64,
        request: u64,
        details: Map<String, Value>,
        error: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Subscribe {
        request: u64,
        options: Map<String, Value>,
        topic: String,
    },
    Subscribed {
        request: u64,
        subscription: u64,
    },
    Event {
        subscription: u64,
        publication: u64,
        details: Map<String, Value>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Call {
        request: u64,
        options: Map<String, Value>,
        procedure: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Result {
        request: u64,
        details: Map<String, Value>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Register {
        request: u64,
        options: Map<String, Value>,
        procedure: String,
    },
    Registered {
        request: u64,
        registration: u64,
    },
    Invocation {
        request: u64,
        registration: u64,
        details: Map<String, Value>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Yield {
        request: u64,
        options: Map<String, Value>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
}

impl Message {
    /// Type code of this message
    pub fn code(&self) -> u64 {
        match self {
            Message::Hello { .. } => HELLO,
            Message::Welcome { .. } => WELCOME,
            Message::Abort { .. } => ABORT,
            Message::Challenge { .. } => CHALLENGE,
            Message::Authenticate { .. } => AUTHENTICATE,
            Message::Goodbye { .. } => GOODBYE,
            Message::Error { .. } => ERROR,
            Message::Subscribe { .. } => SUBSCRIBE,
            Message::Subscribed { .. } => SUBSCRIBED,
            Message::Event { .. } => EVENT,
            Message::Call { .. } => CALL,
            Message::Result { .. } => RESULT,
            Message::Register { .. } => REGISTER,
            Message::Registered { .. } => REGISTERED,
            Message::Invocation { .. } => INVOCATION,
            Message::Yield { .. } => YIELD,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Message::Hello { realm, details } => json!([HELLO, realm, details]),
            Message::Welcome { session, details } => json!([WELCOME, session, details]),
            Message::Abort { details, reason } => json!([ABORT, details, reason]),
            Message::Challenge { method, extra } => json!([CHALLENGE, method, extra]),
            Message::Authenticate { signature, extra } => {
                json!([AUTHENTICATE, signature, extra])
            }
            Message::Goodbye { details, reason } => json!([GOODBYE, details, reason]),
            Message::Error {
                request_type,
                request,
                details,
                error,
                args,
                kwargs,
            } => with_payload(
                vec![
                    json!(ERROR),
                    json!(request_type),
                    json!(request),
                    json!(details),
                    json!(error),
                ],
                args,
                kwargs,
            ),
            Message::Subscribe {
                request,
                options,
                topic,
            } => json!([SUBSCRIBE, request, options, topic]),
            Message::Subscribed {
                request,
                subscription,
            } => json!([SUBSCRIBED, request, subscription]),
            Message::Event {
                subscription,
                publication,
                details,
                args,
                kwargs,
            } => with_payload(
                vec![
                    json!(EVENT),
                    json!(subscription),
                    json!(publication),
                    json!(details),
                ],
                args,
                kwargs,
            ),
            Message::Call {
                request,
                options,
                procedure,
                args,
                kwargs,
            } => with_payload(
                vec![json!(CALL), json!(request), json!(options), json!(procedure)],
                args,
                kwargs,
            ),
            Message::Result {
                request,
                details,
                args,
                kwargs,
            } => with_payload(
                vec![json!(RESULT), json!(request), json!(details)],
                args,
                kwargs,
            ),
            Message::Register {
                request,
                options,
                procedure,
            } => json!([REGISTER, request, options, procedure]),
            Message::Registered {
                request,
                registration,
            } => json!([REGISTERED, request, registration]),
            Message::Invocation {
                request,
                registration,
                details,
                args,
                kwargs,
            } => with_payload(
                vec![
                    json!(INVOCATION),
                    json!(request),
                    json!(registration),
                    json!(details),
                ],
                args,
                kwargs,
            ),
            Message::Yield {
                request,
                options,
                args,
                kwargs,
            } => with_payload(
                vec![json!(YIELD), json!(request), json!(options)],
                args,
                kwargs,
            ),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(WampError::Protocol("message is not an array".to_string()));
        };
        let fields = Fields { items };
        let code = fields.id(0)?;

        let message = match code {
            HELLO => Message::Hello {
                realm: fields.string(1)?,
                details: fields.dict(2)?,
            },
            WELCOME => Message::Welcome {
                session: fields.id(1)?,
                details: fields.dict(2)?,
            },
            ABORT => Message::Abort {
                details: fields.dict(1)?,
                reason: fields.string(2)?,
            },
            CHALLENGE => Message::Challenge {
                method: fields.string(1)?,
                extra: fields.dict(2)?,
            },
            AUTHENTICATE => Message::Authenticate {
                signature: fields.string(1)?,
                extra: fields.dict(2)?,
            },
            GOODBYE => Message::Goodbye {
                details: fields.dict(1)?,
                reason: fields.string(2)?,
            },
            ERROR => Message::Error {
                request_type: fields.id(1)?,
                request: fields.id(2)?,
                details: fields.dict(3)?,
                error: fields.string(4)?,
                args: fields.args(5)?,
                kwargs: fields.kwargs(6)?,
            },
            SUBSCRIBE => Message::Subscribe {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                topic: fields.string(3)?,
            },
            SUBSCRIBED => Message::Subscribed {
                request: fields.id(1)?,
                subscription: fields.id(2)?,
            },
            EVENT => Message::Event {
                subscription: fields.id(1)?,
                publication: fields.id(2)?,
                details: fields.dict(3)?,
                args: fields.args(4)?,
                kwargs: fields.kwargs(5)?,
            },
            CALL => Message::Call {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                procedure: fields.string(3)?,
                args: fields.args(4)?,
                kwargs: fields.kwargs(5)?,
            },
            RESULT => Message::Result {
                request: fields.id(1)?,
                details: fields.dict(2)?,
                args: fields.args(3)?,
                kwargs: fields.kwargs(4)?,
            },
            REGISTER => Message::Register {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                procedure: fields.string(3)?,
            },
            REGISTERED => Message::Registered {
                request: fields.id(1)?,
                registration: fields.id(2)?,
            },
            INVOCATION => Message::Invocation {
                request: fields.id(1)?,
                registration: fields.id(2)?,
                details: fields.dict(3)?,
                args: fields.args(4)?,
                kwargs: fields.kwargs(5)?,
            },
            YIELD => Message::Yield {
                request: fields.id(1)?,
                options: fields.dict(2)?,
                args: fields.args(3)?,
                kwargs: fields.kwargs(4)?,
            },
            other => {
                return Err(WampError::Protocol(format!(
                    "unsupported message type {}",
                    other
                )))
            }
        };

        Ok(message)
    }
}

/// Append optional positional and keyword payloads.
///
/// Trailing empty payloads are omitted; args are kept (as `[]`) when only
/// kwargs are present so positions stay aligned.
fn with_payload(mut head: Vec<Value>, args: &[Value], kwargs: &Map<String, Value>) -> Value {
    if !args.is_empty() || !kwargs.is_empty() {
        head.push(Value::Array(args.to_vec()));
    }
    if !kwargs.is_empty() {
        head.push(Value::Object(kwargs.clone()));
    }
    Value::Array(head)
}

struct Fields {
    items: Vec<Value>,
}

impl Fields {
    fn get(&self, index: usize) -> Result<&Value> {
        self.items
            .get(index)
            .ok_or_else(|| WampError::Protocol(format!("missing field {}", index)))
    }

    fn id(&self, index: usize) -> Result<u64> {
        self.get(index)?
            .as_u64()
            .ok_or_else(|| WampError::Protocol(format!("field {} is not an id", index)))
    }

    fn string(&self, index: usize) -> Result<String> {
        self.get(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WampError::Protocol(format!("field {} is not a string", index)))
    }

    fn dict(&self, index: usize) -> Result<Map<String, Value>> {
        self.get(index)?
            .as_object()
            .cloned()
            .ok_or_else(|| WampError::Protocol(format!("field {} is not a dict", index)))
    }

    fn args(&self, index: usize) -> Result<Vec<Value>> {
        match self.items.get(index) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(WampError::Protocol(format!(
                "field {} is not a list",
                index
            ))),
        }
    }

    fn kwargs(&self, index: usize) -> Result<Map<String, Value>> {
        match self.items.get(index) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(WampError::Protocol(format!(
                "field {} is not a dict",
                index
            ))),
        }
    }
}
