//! Database connection and operations

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::Result;

/// A log event as stored in the archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedEvent {
    pub id: String,
    pub channel: String,
    pub level: String,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })
    }

    /// Load a typed blob stored under `key`
    ///
    /// Returns `Ok(None)` when the key is absent. A blob that no longer
    /// parses is reported as an error so the caller can fall back.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_setting(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_setting(key, &raw)
    }

    /// Append an event to the log archive
    pub fn archive_event(&self, event: &ArchivedEvent) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO log_events (id, channel, level, message, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    event.id,
                    event.channel,
                    event.level,
                    event.message,
                    event.logged_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Most recent archived events, newest first
    pub fn recent_events(&self, limit: usize) -> Result<Vec<ArchivedEvent>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel, level, message, logged_at FROM log_events
                 ORDER BY logged_at DESC, rowid DESC
                 LIMIT ?1",
            )?;

            let events = stmt
                .query_map([limit as i64], |row| {
                    let logged_str: String = row.get(4)?;
                    let logged_at = DateTime::parse_from_rfc3339(&logged_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now());

                    Ok(ArchivedEvent {
                        id: row.get(0)?,
                        channel: row.get(1)?,
                        level: row.get(2)?,
                        message: row.get(3)?,
                        logged_at,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(events)
        })
    }

    /// Drop archived events for one channel
    pub fn clear_archive(&self, channel: &str) -> Result<usize> {
        self.with_connection(|conn| {
            let removed = conn.execute("DELETE FROM log_events WHERE channel = ?1", [channel])?;
            Ok(removed)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, channel: &str, message: &str) -> ArchivedEvent {
        ArchivedEvent {
            id: id.to_string(),
            channel: channel.to_string(),
            level: "error".to_string(),
            message: message.to_string(),
            logged_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            let count: i32 =
                conn.query_row("SELECT COUNT(*) FROM log_events", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_json_settings_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_json::<Vec<u32>>("missing").unwrap(), None);

        db.save_json("numbers", &vec![1u32, 2, 3]).unwrap();
        assert_eq!(
            db.load_json::<Vec<u32>>("numbers").unwrap(),
            Some(vec![1, 2, 3])
        );

        db.set_setting("numbers", "not json").unwrap();
        assert!(db.load_json::<Vec<u32>>("numbers").is_err());
    }

    #[test]
    fn test_archive_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.archive_event(&event("a", "system", "first")).unwrap();
        db.archive_event(&event("b", "pack1", "second")).unwrap();
        db.archive_event(&event("c", "system", "third")).unwrap();

        let recent = db.recent_events(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "third");
        assert_eq!(recent[1].message, "second");

        assert_eq!(db.clear_archive("system").unwrap(), 2);
        let remaining = db.recent_events(10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].channel, "pack1");
    }
}
