//! Local persistence for light-sensor readings.
//!
//! This crate provides SQLite-based storage for lux readings pushed by
//! remote devices, together with the query side used by the dashboard:
//!
//! - Append-only reading table with store-assigned ids
//! - Paginated retrieval, newest first, with total counts
//! - Distinct device listing
//! - Date-range CSV export, oldest first, streamed row by row
//!
//! Timestamps are kept as [`time::OffsetDateTime`] (unix seconds on disk).
//! The `YYYY-MM-DD HH:MM:SS` text form used by clients is produced and
//! parsed by [`CivilClock`], which applies a fixed UTC offset.
//!
//! # Example
//!
//! ```no_run
//! use luxlog_store::{NewReading, PageRequest, Store};
//!
//! let store = Store::open_default()?;
//! store.insert_reading(&NewReading::now("bh1750", 312.5))?;
//!
//! let page = store.get_page(&PageRequest::new(1, 10))?;
//! println!("{} of {} pages", page.page, page.total_pages);
//! # Ok::<(), luxlog_store::Error>(())
//! ```

mod error;
pub mod export;
mod models;
pub mod pagination;
mod queries;
mod schema;
mod store;
mod timestamp;

pub use error::{Error, Result};
pub use export::{CSV_HEADER, CsvExporter, ExportRange};
pub use models::{NewReading, Reading};
pub use pagination::{Page, PageRequest, total_pages};
pub use queries::{ReadingCursor, ReadingQuery};
pub use store::Store;
pub use timestamp::{CivilClock, DEFAULT_UTC_OFFSET};

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/luxlog/readings.db`
/// - macOS: `~/Library/Application Support/luxlog/readings.db`
/// - Windows: `C:\Users\<user>\AppData\Local\luxlog\readings.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("luxlog")
        .join("readings.db")
}
