//! Log Sink
//!
//! Per-channel ordered record of events for operator display.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use phi_storage::{ArchivedEvent, Database};

use crate::event::{Level, LogEvent};

const LIVE_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct Channel {
    events: Vec<LogEvent>,
    /// Appends since the operator last looked at this channel
    unread: usize,
}

struct Archive {
    db: Database,
    min_level: Level,
}

pub struct LogSink {
    channels: Arc<RwLock<HashMap<String, Channel>>>,
    live: broadcast::Sender<LogEvent>,
    archive: Option<Arc<Archive>>,
}

impl LogSink {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);

        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            live,
            archive: None,
        }
    }

    /// Also persist events at or above `min_level`
    pub fn with_archive(db: Database, min_level: Level) -> Self {
        let mut sink = Self::new();
        sink.archive = Some(Arc::new(Archive { db, min_level }));
        sink
    }

    /// Create an empty channel if absent
    pub fn init(&self, channel: &str) {
        self.channels
            .write()
            .entry(channel.to_string())
            .or_default();
    }

    /// Append an event; the channel is created on first use
    pub fn append(&self, channel: &str, message: impl Into<String>, level: Level) -> LogEvent {
        let event = LogEvent::new(channel, message, level);

        {
            let mut channels = self.channels.write();
            let entry = channels.entry(channel.to_string()).or_default();
            entry.events.push(event.clone());
            entry.unread += 1;
        }

        match level {
            Level::Debug => tracing::debug!(channel = %channel, "{}", event.message),
            Level::Info => tracing::info!(channel = %channel, "{}", event.message),
            Level::Warn => tracing::warn!(channel = %channel, "{}", event.message),
            Level::Error => tracing::error!(channel = %channel, "{}", event.message),
        }

        if let Some(archive) = &self.archive {
            if level >= archive.min_level {
                if let Err(e) = archive.db.archive_event(&ArchivedEvent::from(&event)) {
                    tracing::error!("Failed to archive log event: {}", e);
                }
            }
        }

        // No receivers is fine; nobody is watching yet
        let _ = self.live.send(event.clone());

        event
    }

    pub fn debug(&self, channel: &str, message: impl Into<String>) -> LogEvent {
        self.append(channel, message, Level::Debug)
    }

    pub fn info(&self, channel: &str, message: impl Into<String>) -> LogEvent {
        self.append(channel, message, Level::Info)
    }

    pub fn warn(&self, channel: &str, message: impl Into<String>) -> LogEvent {
        self.append(channel, message, Level::Warn)
    }

    pub fn error(&self, channel: &str, message: impl Into<String>) -> LogEvent {
        self.append(channel, message, Level::Error)
    }

    /// Empty one channel; other channels are untouched
    pub fn clear(&self, channel: &str) {
        if let Some(entry) = self.channels.write().get_mut(channel) {
            entry.events.clear();
            entry.unread = 0;
        }
    }

    /// Drop a channel's archived events; returns how many went
    pub fn clear_archived(&self, channel: &str) -> usize {
        let Some(archive) = &self.archive else {
            return 0;
        };

        archive.db.clear_archive(channel).unwrap_or_else(|e| {
            tracing::error!("Failed to clear log archive: {}", e);
            0
        })
    }

    /// Snapshot of a channel's events in insertion order
    pub fn events(&self, channel: &str) -> Vec<LogEvent> {
        self.channels
            .read()
            .get(channel)
            .map(|c| c.events.clone())
            .unwrap_or_default()
    }

    /// Number of events in a channel at a given level
    pub fn count(&self, channel: &str, level: Level) -> usize {
        self.channels
            .read()
            .get(channel)
            .map(|c| c.events.iter().filter(|e| e.level == level).count())
            .unwrap_or(0)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unread(&self, channel: &str) -> usize {
        self.channels
            .read()
            .get(channel)
            .map(|c| c.unread)
            .unwrap_or(0)
    }

    pub fn mark_read(&self, channel: &str) {
        if let Some(entry) = self.channels.write().get_mut(channel) {
            entry.unread = 0;
        }
    }

    /// Live feed of every appended event
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.live.subscribe()
    }

    /// Archived events, newest first (empty without an archive)
    pub fn archived(&self, limit: usize) -> Vec<ArchivedEvent> {
        let Some(archive) = &self.archive else {
            return Vec::new();
        };

        archive.db.recent_events(limit).unwrap_or_else(|e| {
            tracing::error!("Failed to read log archive: {}", e);
            Vec::new()
        })
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LogSink {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            live: self.live.clone(),
            archive: self.archive.clone(),
        }
    }
}
