//! Phi Core
//!
//! The operator console's application controller. [`Console`] owns every
//! piece of shared state (settings, log sink, targets, router, key binding,
//! pending decisions) and hands each component what it needs at
//! construction. The [`SessionConnector`] reacts to connection lifecycle
//! events and wires a fresh session into the rest of the console.

mod config;
mod connector;
mod console;
mod decisions;
mod error;
mod settings;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use connector::{SessionConnector, DECISION_PROCEDURE};
pub use console::Console;
pub use decisions::{DecisionQueue, PendingDecision};
pub use error::CoreError;
pub use settings::{CommSettings, Settings, TargetSettings, SETTINGS_KEY};

// Re-export the pieces front-ends touch directly
pub use phi_input::{Key, KeySteps, VoiceCommand};
pub use phi_log::{Level, LogEvent, LogSink, SYSTEM_CHANNEL};
pub use phi_pack::{Motion, Operation, Outcome, Pose, Target};
pub use phi_storage::{ArchivedEvent, Database};
pub use phi_wamp::ConnectionState;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging with the default `info` filter
pub fn init_logging() {
    init_logging_with("info");
}

/// Initialize logging; `RUST_LOG` overrides `default_filter`
pub fn init_logging_with(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
