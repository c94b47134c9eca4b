//! Schema migrations
//!
//! The schema version lives in SQLite's `user_version` pragma. Entry `n`
//! of [`MIGRATIONS`] moves the schema from version `n` to `n + 1`.

use crate::Result;
use rusqlite::Connection;

type Migration = fn(&Connection) -> Result<()>;

const MIGRATIONS: &[(&str, Migration)] = &[("settings and log archive", settings_and_log_archive)];

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let applied = usize::try_from(current).unwrap_or(0);

    for (index, (name, migrate)) in MIGRATIONS.iter().enumerate().skip(applied) {
        let version = index + 1;
        tracing::info!(version, "Running migration: {}", name);
        migrate(conn)?;
        conn.pragma_update(None, "user_version", version as i64)?;
    }

    Ok(())
}

fn settings_and_log_archive(conn: &Connection) -> Result<()> {
    // Levels are stored by name so the archive reads well from the sqlite shell
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS log_events (
            id TEXT PRIMARY KEY,
            channel TEXT NOT NULL,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            logged_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_log_events_channel ON log_events(channel);
        CREATE INDEX IF NOT EXISTS idx_log_events_logged ON log_events(logged_at);
    "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_version(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        assert_eq!(user_version(&conn), MIGRATIONS.len() as i64);

        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES ('k', 'v', 'now')",
            [],
        )
        .unwrap();

        // A second run leaves existing data alone
        run_migrations(&conn).unwrap();
        let value: String = conn
            .query_row("SELECT value FROM settings WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, "v");
    }
}
