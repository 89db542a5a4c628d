//! Query builder for stored readings.
//!
//! [`ReadingQuery`] follows the builder pattern for filtering, ordering and
//! paginating readings. Every ordering is total: `recorded_at` first, then
//! `id` as the tie-break, so repeated queries return rows in the same order.
//!
//! # Example
//!
//! ```
//! use luxlog_store::{ReadingQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! // Second page of ten, newest first
//! let page = ReadingQuery::new().limit(10).offset(10);
//! let readings = store.query_readings(&page)?;
//!
//! // One device since yesterday, oldest first
//! let range = ReadingQuery::new()
//!     .device("bh1750")
//!     .since(yesterday)
//!     .oldest_first();
//! let readings = store.query_readings(&range)?;
//! # Ok::<(), luxlog_store::Error>(())
//! ```

use time::OffsetDateTime;

/// Position of a reading in the total `(recorded_at, id)` order.
///
/// Used for keyset continuation: a query with [`ReadingQuery::after`]
/// resumes strictly past this position in the query's direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingCursor {
    pub recorded_at: OffsetDateTime,
    pub id: i64,
}

impl From<&crate::Reading> for ReadingCursor {
    fn from(reading: &crate::Reading) -> Self {
        Self {
            recorded_at: reading.recorded_at,
            id: reading.id,
        }
    }
}

/// Fluent query builder for readings.
///
/// Use this to construct queries for [`Store::query_readings`](crate::Store::query_readings).
/// All filter methods are optional and can be chained in any order.
///
/// By default, queries return results ordered by `recorded_at` descending
/// (newest first), ties broken by `id` descending.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by exact device ID.
    pub device_id: Option<String>,
    /// Include only readings at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Include only readings at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Resume strictly after this position.
    pub after: Option<ReadingCursor>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Number of results to skip.
    pub offset: Option<u64>,
    /// Order newest first.
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No device filter (all devices)
    /// - No time range filter
    /// - No limit (all matching records)
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by device ID.
    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    /// Filter to readings recorded at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to readings recorded at or before this time.
    ///
    /// Use with `since()` to query an inclusive range.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Continue after a previously returned reading.
    pub fn after(mut self, cursor: ReadingCursor) -> Self {
        self.after = Some(cursor);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    ///
    /// Use with `limit()` for pagination. For example, to get page 3
    /// with 10 items per page: `.limit(10).offset(20)`.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results oldest first (ascending by `recorded_at`, then `id`).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("recorded_at >= ?");
            params.push(Box::new(since.unix_timestamp()));
        }

        if let Some(until) = self.until {
            conditions.push("recorded_at <= ?");
            params.push(Box::new(until.unix_timestamp()));
        }

        if let Some(cursor) = self.after {
            conditions.push(if self.newest_first {
                "(recorded_at, id) < (?, ?)"
            } else {
                "(recorded_at, id) > (?, ?)"
            });
            params.push(Box::new(cursor.recorded_at.unix_timestamp()));
            params.push(Box::new(cursor.id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, device_id, lux, recorded_at FROM readings {} \
             ORDER BY recorded_at {order}, id {order}",
            where_clause
        );

        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", clamp_i64(limit))),
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", clamp_i64(offset)));
        }

        sql
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
