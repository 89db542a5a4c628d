//! HTTP ingestion and reporting service for light-sensor readings.
//!
//! This crate provides a service that:
//! - Accepts lux readings pushed by remote devices
//! - Serves paginated readings, newest first, to a dashboard
//! - Lists the devices that have reported
//! - Streams per-device CSV exports over a date range
//! - Optionally serves the dashboard's static files
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `POST /api/data` - Ingest `{"device_id": "...", "lux": 123.4}`
//! - `GET /api/data?page=&limit=` - Paginated readings
//! - `GET /api/devices` - Distinct device ids
//! - `GET /api/export-csv?device_id=&start_date=&end_date=` - CSV download
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/luxlog/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//! static_dir = "front-end"
//!
//! [storage]
//! path = "~/.local/share/luxlog/readings.db"
//!
//! [pagination]
//! default_limit = 10
//! max_limit = 1000
//!
//! [export]
//! batch_size = 500
//!
//! [time]
//! utc_offset = "+07:00"
//! ```

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod state;

pub use config::{
    Config, ConfigError, ExportConfig, PaginationConfig, ServerConfig, StorageConfig, TimeConfig,
};
pub use state::AppState;

/// Build the full application: API routes, optional static files, tracing and CORS.
///
/// Paths not matched by the API fall through to `static_dir` when given.
pub fn app(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new().merge(api::router());

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
