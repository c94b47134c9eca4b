//! Input error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Unrecognized phrase: {0}")]
    UnknownPhrase(String),

    #[error("Unknown robot: {0}")]
    UnknownTarget(String),

    #[error("Pack error: {0}")]
    Pack(#[from] phi_pack::PackError),
}
