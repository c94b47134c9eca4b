//! Phi Storage Layer
//!
//! SQLite persistence for the operator console.
//! Holds the settings blob and the archived operator log; nothing else
//! outlives a console restart.

mod database;
mod error;
mod migrations;

pub use database::{ArchivedEvent, Database};
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
