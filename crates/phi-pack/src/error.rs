//! Pack error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("Unknown robot: {0}")]
    UnknownTarget(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("WAMP error: {0}")]
    Wamp(#[from] phi_wamp::WampError),
}
