//! REST API endpoints for the luxlog-service.
//!
//! # Concurrency and Lock Acquisition
//!
//! - **`state.config`** (RwLock): read briefly to pick up paging and export settings.
//! - **`state.store`** (Mutex): held for one database operation at a time.
//!   `GET /api/data` holds it across the count and the page query so both
//!   see the same rows. CSV exports take it once per batch, so a long
//!   download never blocks ingestion for more than one batch.
//!
//! When both are needed, `config` is read and released before `store` is locked.
//!
//! ## Error Handling
//!
//! JSON endpoints return `{"error": "..."}` via [`AppError`]. The CSV export
//! endpoint returns the same errors as plain text via [`PlainTextError`].
//!
//! # Example
//!
//! ```ignore
//! use luxlog_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::StreamExt;
use luxlog_store::{CivilClock, CsvExporter, ExportRange, NewReading, Reading, ReadingCursor};
use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::PaginationConfig;
use crate::state::AppState;

/// Encoded batches buffered between the export task and the response body.
const EXPORT_CHANNEL_CAPACITY: usize = 4;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/data", get(get_data).post(ingest))
        .route("/api/devices", get(list_devices))
        .route("/api/export-csv", get(export_csv))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

// ==========================================================================
// Ingestion
// ==========================================================================

/// Body of `POST /api/data`.
///
/// Both fields are optional here so that a missing field is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub device_id: Option<String>,
    pub lux: Option<f64>,
}

impl IngestRequest {
    /// Check required fields and stamp the reading with the current time.
    pub fn into_reading(self) -> Result<NewReading, AppError> {
        let device_id = self
            .device_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Validation("Missing required field: device_id".to_string()))?;
        let lux = self
            .lux
            .ok_or_else(|| AppError::Validation("Missing required field: lux".to_string()))?;

        Ok(NewReading::now(device_id, lux))
    }
}

/// Response of a successful ingest.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
    pub id: i64,
}

/// Accept one reading from a device.
///
/// # Errors
///
/// - [`AppError::Validation`] if the body is not a JSON object or a field is missing
/// - [`AppError::Store`] if the insert fails
async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let reading = request.into_reading()?;

    let id = {
        let store = state.store.lock().await;
        store.insert_reading(&reading)?
    };

    info!(
        "Saved reading {} from {}: {} lux",
        id, reading.device_id, reading.lux
    );

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            message: "Success",
            id,
        }),
    ))
}

// ==========================================================================
// Pagination
// ==========================================================================

/// Query parameters for `GET /api/data`.
///
/// Kept as text so malformed values fall back to defaults instead of
/// rejecting the request. A value is read from its leading decimal digits
/// after optional whitespace and sign, so `2abc` means page 2.
#[derive(Debug, Deserialize, Default)]
pub struct DataQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl DataQuery {
    /// Effective page window after defaults and the configured cap.
    pub fn page_request(&self, config: &PaginationConfig) -> luxlog_store::PageRequest {
        let page = positive(self.page.as_deref()).unwrap_or(1);
        let limit = positive(self.limit.as_deref())
            .unwrap_or(config.default_limit)
            .min(config.max_limit);

        luxlog_store::PageRequest::new(page, limit)
    }
}

fn positive(value: Option<&str>) -> Option<u64> {
    let text = value?.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let n = rest[..digits].parse::<u64>().ok()?;

    (!negative && n > 0).then_some(n)
}

/// A reading as shown to clients.
#[derive(Debug, Serialize)]
pub struct DataRow {
    pub id: i64,
    pub device_id: String,
    #[serde(serialize_with = "serialize_lux")]
    pub lux: f64,
    /// `YYYY-MM-DD HH:MM:SS` in the configured offset.
    pub timestamp: String,
}

impl DataRow {
    fn new(reading: Reading, clock: &CivilClock) -> Self {
        Self {
            timestamp: clock.format(reading.recorded_at),
            id: reading.id,
            device_id: reading.device_id,
            lux: reading.lux,
        }
    }
}

/// Write whole lux values as JSON integers (`120`, not `120.0`).
fn serialize_lux<S: Serializer>(lux: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    if lux.fract() == 0.0 && lux.abs() <= MAX_EXACT {
        serializer.serialize_i64(*lux as i64)
    } else {
        serializer.serialize_f64(*lux)
    }
}

/// Paginated response wrapper with metadata.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total_records: u64,
    pub total_pages: u64,
}

/// Get one page of readings across all devices, newest first.
///
/// # Query Parameters
///
/// - `page`: 1-based page number (default 1)
/// - `limit`: rows per page (default `pagination.default_limit`, capped at `pagination.max_limit`)
async fn get_data(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DataQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<DataRow>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;
    let request = {
        let config = state.config.read().await;
        params.page_request(&config.pagination)
    };

    let page = {
        let store = state.store.lock().await;
        store.get_page(&request)?
    };

    let page = page.map(|reading| DataRow::new(reading, &state.clock));

    Ok(Json(PaginatedResponse {
        pagination: PaginationMeta {
            page: page.page,
            limit: page.limit,
            total_records: page.total_records,
            total_pages: page.total_pages,
        },
        data: page.rows,
    }))
}

// ==========================================================================
// Devices
// ==========================================================================

/// List every device id that has reported at least one reading.
async fn list_devices(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, AppError> {
    let store = state.store.lock().await;
    let devices = store.list_devices()?;
    Ok(Json(devices))
}

// ==========================================================================
// CSV export
// ==========================================================================

/// Query parameters for `GET /api/export-csv`.
#[derive(Debug, Deserialize, Default)]
pub struct ExportQuery {
    pub device_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ExportQuery {
    /// Resolve the requested range in the given clock's offset.
    pub fn range(&self, clock: &CivilClock) -> Result<ExportRange, AppError> {
        let (Some(device_id), Some(start), Some(end)) = (
            non_empty(&self.device_id),
            non_empty(&self.start_date),
            non_empty(&self.end_date),
        ) else {
            return Err(AppError::Validation(
                "device_id, start_date and end_date are required".to_string(),
            ));
        };

        ExportRange::parse(device_id, start, end, clock)
            .map_err(|e| AppError::Validation(e.to_string()))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Download file name for an export started at `at`.
///
/// Characters outside `[A-Za-z0-9_-]` in the device id become `_`.
pub fn export_filename(device_id: &str, at: OffsetDateTime) -> String {
    let device: String = device_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let millis = at.unix_timestamp_nanos() / 1_000_000;

    format!("data_{}_{}.csv", device, millis)
}

/// Stream one device's readings in a time range as a CSV attachment.
///
/// The first batch is read before the response starts, so a failing store
/// yields a `500` instead of a truncated file. Later batches are produced by
/// a background task; if one fails the body is aborted mid-transfer.
///
/// # Query Parameters
///
/// - `device_id`: exact device id
/// - `start_date`, `end_date`: inclusive bounds, `YYYY-MM-DDTHH:MM` or `YYYY-MM-DD HH:MM[:SS]`
async fn export_csv(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, PlainTextError> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;
    let range = params.range(&state.clock)?;
    let batch_size = state.config.read().await.export.batch_size.max(1);

    let first = {
        let store = state.store.lock().await;
        store.export_batch(&range, None, batch_size)?
    };
    let head = encode_batch(&first, state.clock, true)?;

    let filename = export_filename(&range.device_id, OffsetDateTime::now_utc());
    info!("Exporting {} as {}", range.device_id, filename);

    let body = match first.last() {
        Some(last) if first.len() as u64 == batch_size => {
            let (tx, rx) = mpsc::channel(EXPORT_CHANNEL_CAPACITY);
            tokio::spawn(stream_remaining(
                Arc::clone(&state),
                range,
                last.into(),
                batch_size,
                tx,
            ));

            let rest = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (chunk, rx))
            });
            Body::from_stream(futures::stream::iter([Ok(head)]).chain(rest))
        }
        _ => Body::from(head),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// Feed the rest of an export into `tx`, one keyset batch per store lock.
async fn stream_remaining(
    state: Arc<AppState>,
    range: ExportRange,
    mut after: ReadingCursor,
    batch_size: u64,
    tx: mpsc::Sender<luxlog_store::Result<Vec<u8>>>,
) {
    let mut rows = batch_size;

    loop {
        let batch = {
            let store = state.store.lock().await;
            store.export_batch(&range, Some(after), batch_size)
        };

        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    "Export of {} aborted after {} rows: {}",
                    range.device_id, rows, e
                );
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let Some(last) = batch.last() else { break };
        after = last.into();
        rows += batch.len() as u64;

        let chunk = encode_batch(&batch, state.clock, false);
        let failed = chunk.is_err();
        if tx.send(chunk).await.is_err() {
            debug!("Export client for {} went away", range.device_id);
            return;
        }
        if failed || (batch.len() as u64) < batch_size {
            break;
        }
    }

    debug!("Export of {} finished: {} rows", range.device_id, rows);
}

fn encode_batch(
    readings: &[Reading],
    clock: CivilClock,
    with_header: bool,
) -> luxlog_store::Result<Vec<u8>> {
    let mut exporter = CsvExporter::new(Vec::new(), clock);
    if with_header {
        exporter.write_header()?;
    }
    for reading in readings {
        exporter.write_reading(reading)?;
    }
    exporter.finish()
}

// ==========================================================================
// Errors
// ==========================================================================

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// The request is missing or has malformed input.
    Validation(String),
    /// The store failed.
    Store(luxlog_store::Error),
}

impl From<luxlog_store::Error> for AppError {
    fn from(e: luxlog_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl AppError {
    fn into_parts(self) -> (StatusCode, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => {
                error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.into_parts();

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

/// [`AppError`] rendered as a `text/plain` body.
#[derive(Debug)]
pub struct PlainTextError(pub AppError);

impl From<AppError> for PlainTextError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl From<luxlog_store::Error> for PlainTextError {
    fn from(e: luxlog_store::Error) -> Self {
        Self(AppError::Store(e))
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        self.0.into_parts().into_response()
    }
}
