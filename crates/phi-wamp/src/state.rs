//! Connection State Machine
//!
//! ```text
//! Closed
//!   ↓ connect
//! Connecting ──────────────┐
//!   ↓ welcome              │ drop / unreachable
//! Open ⇄ Retrying(reason) ←┘
//!   ↓ leave, fatal abort, retries exhausted
//! Closed
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "reason")]
pub enum ConnectionState {
    /// No connection and none being attempted
    Closed,
    /// First attempt in progress
    Connecting,
    /// Session joined; calls may be issued
    Open,
    /// Transport dropped; reconnecting per retry policy
    Retrying(String),
}

impl ConnectionState {
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, target) {
            (Closed, Connecting) => true,
            (Connecting, Open) | (Connecting, Retrying(_)) | (Connecting, Closed) => true,
            (Open, Retrying(_)) | (Open, Closed) => true,
            // Failed reconnect attempts stay in Retrying with a fresh reason
            (Retrying(_), Open) | (Retrying(_), Retrying(_)) | (Retrying(_), Closed) => true,
            _ => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Retrying(reason) => reason,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Retrying(reason) => write!(f, "retrying ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
