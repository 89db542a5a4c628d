//! CSV export of one device's readings over an inclusive time range.
//!
//! Output is a header line followed by one line per reading, oldest first,
//! `\n`-terminated. Fields containing commas, quotes or newlines are quoted.
//!
//! # Example
//!
//! ```
//! use luxlog_store::{CivilClock, ExportRange, NewReading, Store};
//!
//! let store = Store::open_in_memory()?;
//! store.insert_reading(&NewReading::now("bh1750", 12.5))?;
//!
//! let clock = CivilClock::default();
//! let range = ExportRange::parse("bh1750", "2000-01-01T00:00", "2100-01-01T00:00", &clock)?;
//!
//! let mut out = Vec::new();
//! let rows = store.export_csv(&range, &clock, &mut out)?;
//! assert_eq!(rows, 1);
//! # Ok::<(), luxlog_store::Error>(())
//! ```

use std::io::Write;

use time::OffsetDateTime;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Reading;
use crate::queries::{ReadingCursor, ReadingQuery};
use crate::store::Store;
use crate::timestamp::CivilClock;

/// Column names of the export file.
pub const CSV_HEADER: [&str; 4] = ["ID", "Device ID", "Lux", "Timestamp"];

/// Readings of one device between two instants, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRange {
    pub device_id: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl ExportRange {
    pub fn new(device_id: impl Into<String>, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            device_id: device_id.into(),
            start,
            end,
        }
    }

    /// Build a range from client timestamp text read in `clock`'s offset.
    ///
    /// A start after the end is accepted and matches nothing.
    pub fn parse(device_id: &str, start: &str, end: &str, clock: &CivilClock) -> Result<Self> {
        Ok(Self::new(device_id, clock.parse(start)?, clock.parse(end)?))
    }

    /// Query for the range in export order.
    pub fn query(&self) -> ReadingQuery {
        ReadingQuery::new()
            .device(&self.device_id)
            .since(self.start)
            .until(self.end)
            .oldest_first()
    }
}

/// Writes readings as CSV records to any [`Write`] sink.
pub struct CsvExporter<W: Write> {
    writer: csv::Writer<W>,
    clock: CivilClock,
    rows: u64,
}

impl<W: Write> CsvExporter<W> {
    pub fn new(sink: W, clock: CivilClock) -> Self {
        let writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(sink);

        Self {
            writer,
            clock,
            rows: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record(CSV_HEADER)?;
        Ok(())
    }

    pub fn write_reading(&mut self, reading: &Reading) -> Result<()> {
        self.writer.write_record([
            reading.id.to_string(),
            reading.device_id.clone(),
            reading.lux.to_string(),
            self.clock.format(reading.recorded_at),
        ])?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far, excluding the header.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush buffered output and return the sink.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

impl Store {
    /// Write the CSV export of `range` to `sink`, returning the row count.
    ///
    /// Rows are encoded straight from the SQLite cursor.
    pub fn export_csv<W: Write>(
        &self,
        range: &ExportRange,
        clock: &CivilClock,
        sink: W,
    ) -> Result<u64> {
        let mut exporter = CsvExporter::new(sink, *clock);
        exporter.write_header()?;
        self.for_each_reading(&range.query(), |reading| exporter.write_reading(&reading))?;

        let rows = exporter.rows_written();
        exporter.finish()?;

        debug!("Exported {} rows for {}", rows, range.device_id);
        Ok(rows)
    }

    /// Fetch the next batch of `range`, strictly after `after` when given.
    ///
    /// Feeding the last row of each batch back as `after` walks the whole
    /// range once, even while new readings are being inserted.
    pub fn export_batch(
        &self,
        range: &ExportRange,
        after: Option<ReadingCursor>,
        limit: u64,
    ) -> Result<Vec<Reading>> {
        let mut query = range.query().limit(limit);
        if let Some(cursor) = after {
            query = query.after(cursor);
        }
        self.query_readings(&query)
    }
}
