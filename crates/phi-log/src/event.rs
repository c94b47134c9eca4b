//! Log event data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity on the console's 4-level scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Collapse a remote logging code onto the 4-level scale
    ///
    /// Robots publish Python logging levels: 40/50 error, 30 warning,
    /// 20 info. Everything else (10, 0, unknown) is debug.
    pub fn from_remote_code(code: i64) -> Self {
        match code {
            40 | 50 => Level::Error,
            30 => Level::Warn,
            20 => Level::Info,
            _ => Level::Debug,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// One immutable entry in a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub channel: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
}

impl LogEvent {
    pub fn new(channel: impl Into<String>, message: impl Into<String>, level: Level) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            message: message.into(),
            timestamp: Utc::now(),
            level,
        }
    }

    /// Wall-clock time the way the operator panel shows it (24h)
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

impl From<&LogEvent> for phi_storage::ArchivedEvent {
    fn from(event: &LogEvent) -> Self {
        Self {
            id: event.id.clone(),
            channel: event.channel.clone(),
            level: event.level.as_str().to_string(),
            message: event.message.clone(),
            logged_at: event.timestamp,
        }
    }
}
