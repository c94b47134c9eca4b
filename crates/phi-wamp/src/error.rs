//! WAMP error types

use serde_json::{Map, Value};
use thiserror::Error;

/// An ERROR message returned by the remote peer
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// Error URI, e.g. `wamp.error.no_such_procedure`
    pub uri: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl RemoteError {
    /// First positional argument when it is a string
    pub fn message(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.uri, message),
            None => write!(f, "{}", self.uri),
        }
    }
}

#[derive(Error, Debug)]
pub enum WampError {
    #[error("Invalid connection settings: {0}")]
    InvalidConfig(String),

    #[error("Connection already exists ({0})")]
    AlreadyConnected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Join aborted by router: {reason}")]
    Aborted {
        reason: String,
        message: Option<String>,
    },

    #[error("Unknown challenge method: {0}")]
    UnsupportedAuthMethod(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Remote error: {0}")]
    Remote(RemoteError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WampError {
    /// Fatal errors end a connect attempt without retrying
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WampError::InvalidConfig(_)
                | WampError::Aborted { .. }
                | WampError::UnsupportedAuthMethod(_)
                | WampError::Auth(_)
        )
    }
}
