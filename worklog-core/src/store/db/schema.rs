//! Embedded database schema and migrations
//!
//! SQLite with embedded migrations managed via PRAGMA user_version. A
//! database stamped with a newer version than this build understands fails
//! with `SchemaVersionMismatch` instead of being touched.

use crate::error::{Error, Result};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: initial schema. Everything here is derived state; the
    // documents on disk stay authoritative and any table can be truncated
    // and repopulated by a rebuild.
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        path             TEXT PRIMARY KEY,
        date             TEXT NOT NULL,
        suffix           TEXT,
        topics           JSON NOT NULL,
        plan             TEXT,
        phases           JSON NOT NULL,
        files            JSON NOT NULL,
        duration_minutes INTEGER,
        status           TEXT NOT NULL,
        body             TEXT NOT NULL,
        extra            JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date DESC);
    CREATE INDEX IF NOT EXISTS idx_sessions_plan ON sessions(plan);

    CREATE TABLE IF NOT EXISTS plans (
        id               TEXT PRIMARY KEY,
        path             TEXT NOT NULL,
        title            TEXT NOT NULL,
        status           TEXT NOT NULL,
        author           TEXT NOT NULL,
        topics           JSON NOT NULL,
        created_at       TEXT NOT NULL,
        started_at       TEXT,
        completed_at     TEXT,
        progress         JSON NOT NULL,
        body             TEXT NOT NULL,
        extra            JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_plans_status ON plans(status);
    CREATE INDEX IF NOT EXISTS idx_plans_author ON plans(author);

    CREATE TABLE IF NOT EXISTS learned (
        path             TEXT PRIMARY KEY,
        title            TEXT NOT NULL,
        topics           JSON NOT NULL,
        updated          TEXT,
        body             TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pointers (
        author           TEXT PRIMARY KEY,
        plan             TEXT,
        status           TEXT,
        last_updated     TEXT NOT NULL,
        path             TEXT NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    if current_version > SCHEMA_VERSION {
        return Err(Error::SchemaVersionMismatch {
            found: current_version,
            supported: SCHEMA_VERSION,
        });
    }

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking index database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running index database migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["sessions", "plans", "learned", "pointers"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1), [])
            .unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(matches!(err, Error::SchemaVersionMismatch { .. }));
    }
}
