//! Phi Log Sink
//!
//! Operator feedback lives here:
//! - One ordered, append-only sequence of events per channel
//! - Entries only disappear through an explicit `clear(channel)`
//! - Every append is mirrored to `tracing` and broadcast to live viewers
//! - Warn/error events may be archived to SQLite

mod event;
mod sink;

pub use event::{Level, LogEvent};
pub use sink::LogSink;

/// Channel used for console-wide messages
pub const SYSTEM_CHANNEL: &str = "system";
