//! Application state shared across handlers.

use std::sync::Arc;

use luxlog_store::{CivilClock, Store};
use tokio::sync::{Mutex, RwLock};

use crate::config::{Config, ConfigError};

/// Shared application state.
pub struct AppState {
    /// The reading store. The mutex serializes all access to the connection.
    pub store: Mutex<Store>,
    /// Configuration.
    pub config: RwLock<Config>,
    /// Renders and parses client timestamp text.
    pub clock: CivilClock,
}

impl AppState {
    /// Create new application state.
    ///
    /// The clock is fixed from `config.time` at startup.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] if `time.utc_offset` is malformed.
    pub fn new(store: Store, config: Config) -> Result<Arc<Self>, ConfigError> {
        let clock = config.time.clock()?;
        Ok(Arc::new(Self {
            store: Mutex::new(store),
            config: RwLock::new(config),
            clock,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxlog_store::NewReading;
    use time::UtcOffset;

    #[tokio::test]
    async fn test_app_state_new() {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default()).unwrap();

        let config = state.config.read().await;
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(state.clock, CivilClock::default());
    }

    #[tokio::test]
    async fn test_app_state_uses_configured_offset() {
        let mut config = Config::default();
        config.time.utc_offset = "+00:00".to_string();
        let state = AppState::new(Store::open_in_memory().unwrap(), config).unwrap();

        assert_eq!(state.clock.offset(), UtcOffset::UTC);
    }

    #[test]
    fn test_app_state_rejects_malformed_offset() {
        let mut config = Config::default();
        config.time.utc_offset = "UTC+7".to_string();

        let result = AppState::new(Store::open_in_memory().unwrap(), config);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_app_state_store_access() {
        let state = AppState::new(Store::open_in_memory().unwrap(), Config::default()).unwrap();

        {
            let store = state.store.lock().await;
            store.insert_reading(&NewReading::now("porch", 80.0)).unwrap();
        }

        let store = state.store.lock().await;
        assert_eq!(store.list_devices().unwrap(), vec!["porch"]);
    }
}
