//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] phi_storage::StorageError),

    #[error("Connection error: {0}")]
    Wamp(#[from] phi_wamp::WampError),

    #[error("Command error: {0}")]
    Pack(#[from] phi_pack::PackError),

    #[error("Input error: {0}")]
    Input(#[from] phi_input::InputError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No decision is pending")]
    NoPendingDecision,
}
