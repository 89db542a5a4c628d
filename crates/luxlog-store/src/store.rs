//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, Row};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{NewReading, Reading};
use crate::queries::ReadingQuery;
use crate::schema;

/// SQLite-based store for lux readings.
///
/// The store owns the only connection to the readings table. Callers that
/// share it across tasks wrap it in a mutex, which serializes writes.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// Reading operations
impl Store {
    /// Append a reading and return its assigned id.
    pub fn insert_reading(&self, reading: &NewReading) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO readings (device_id, lux, recorded_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                reading.device_id,
                reading.lux,
                reading.recorded_at.unix_timestamp(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted reading {} for {}", id, reading.device_id);
        Ok(id)
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let mut readings = Vec::new();
        self.for_each_reading(query, |reading| {
            readings.push(reading);
            Ok(())
        })?;
        Ok(readings)
    }

    /// Visit matching readings in query order without collecting them.
    ///
    /// Rows are decoded one at a time from the SQLite cursor. Returns the
    /// number of rows visited; stops at the first error from `visit`.
    pub fn for_each_reading<F>(&self, query: &ReadingQuery, mut visit: F) -> Result<u64>
    where
        F: FnMut(Reading) -> Result<()>,
    {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_ref.as_slice())?;

        let mut visited = 0;
        while let Some(row) = rows.next()? {
            visit(reading_from_row(row)?)?;
            visited += 1;
        }

        Ok(visited)
    }

    /// Count readings, optionally for one device.
    pub fn count_readings(&self, device_id: Option<&str>) -> Result<u64> {
        let count: i64 = match device_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE device_id = ?",
                [id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }

    /// List every distinct device id that has reported a reading.
    ///
    /// Returned sorted for stable output; callers should not rely on order.
    pub fn list_devices(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT device_id FROM readings ORDER BY device_id")?;

        let devices = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(devices)
    }
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let recorded_at: i64 = row.get(3)?;
    let recorded_at = OffsetDateTime::from_unix_timestamp(recorded_at).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    Ok(Reading {
        id: row.get(0)?,
        device_id: row.get(1)?,
        lux: row.get(2)?,
        recorded_at,
    })
}
