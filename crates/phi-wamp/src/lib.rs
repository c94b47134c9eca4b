//! Phi WAMP Client
//!
//! A WAMP v2 client sized for one operator console:
//! - JSON serialization over the `wamp.2.json` WebSocket subprotocol
//! - `wampcra` challenge-response authentication
//! - Caller, callee and subscriber roles
//! - One logical connection at a time with retry/backoff on transport drops
//!
//! ```text
//! closed → connecting → open → (retrying ⇄ open) → closed
//! ```

mod auth;
mod client;
mod error;
pub mod message;
mod retry;
mod session;
mod state;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use auth::{derive_key, sign_challenge, Credentials, WAMPCRA};
pub use client::{Client, CloseReason, ConnectConfig, ConnectionEvent};
pub use error::{RemoteError, WampError};
pub use message::Message;
pub use retry::RetryPolicy;
pub use session::{CallResult, Event, Invocation, SessionHandle};
pub use state::ConnectionState;
pub use transport::{Connector, Transport, WebSocketConnector};

pub type Result<T> = std::result::Result<T, WampError>;
