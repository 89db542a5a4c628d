//! Database schema.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version, tracked in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        // Fresh database - create all tables
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Append-only sensor readings; recorded_at is unix seconds (UTC)
        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL,
            lux REAL NOT NULL,
            recorded_at INTEGER NOT NULL
        );

        -- Newest-first paging over all devices
        CREATE INDEX IF NOT EXISTS idx_readings_time
            ON readings(recorded_at, id);

        -- Per-device range export
        CREATE INDEX IF NOT EXISTS idx_readings_device_time
            ON readings(device_id, recorded_at, id);
        "#,
    )?;

    Ok(())
}
