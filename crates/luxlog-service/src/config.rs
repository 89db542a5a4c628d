//! Server configuration.

use std::path::{Path, PathBuf};

use luxlog_store::CivilClock;
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Paging of `GET /api/data`.
    pub pagination: PaginationConfig,
    /// CSV export settings.
    pub export: ExportConfig,
    /// Civil time used for timestamp text.
    pub time: TimeConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml()?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use luxlog_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.pagination.validate());
        errors.extend(self.export.validate());
        errors.extend(self.time.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind: String,
    /// Directory of dashboard files served for non-API paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
        } else {
            match self.bind.rsplit_once(':') {
                None => errors.push(ValidationError::new(
                    "server.bind",
                    format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                )),
                Some((_, port)) => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                    Err(_) => errors.push(ValidationError::new(
                        "server.bind",
                        format!("invalid port '{}': must be a number 1-65535", port),
                    )),
                    Ok(_) => {}
                },
            }
        }

        if let Some(dir) = &self.static_dir
            && dir.as_os_str().is_empty()
        {
            errors.push(ValidationError::new(
                "server.static_dir",
                "static directory cannot be empty (omit it instead)",
            ));
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: luxlog_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }

        errors
    }
}

/// Page sizes for `GET /api/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Rows per page when the client sends no usable `limit`.
    pub default_limit: u64,
    /// Upper bound applied to client-supplied `limit`.
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 1000,
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.default_limit == 0 {
            errors.push(ValidationError::new(
                "pagination.default_limit",
                "default limit must be at least 1",
            ));
        }
        if self.max_limit == 0 {
            errors.push(ValidationError::new(
                "pagination.max_limit",
                "max limit must be at least 1",
            ));
        } else if self.default_limit > self.max_limit {
            errors.push(ValidationError::new(
                "pagination.default_limit",
                format!(
                    "default limit {} exceeds max limit {}",
                    self.default_limit, self.max_limit
                ),
            ));
        }

        errors
    }
}

/// CSV export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Rows fetched per store lock while streaming an export.
    pub batch_size: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.batch_size == 0 {
            errors.push(ValidationError::new(
                "export.batch_size",
                "batch size must be at least 1",
            ));
        }

        errors
    }
}

/// Civil time settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Fixed UTC offset for rendered and parsed timestamps, as `±HH:MM`.
    pub utc_offset: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+07:00".to_string(),
        }
    }
}

impl TimeConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if CivilClock::from_offset_str(&self.utc_offset).is_err() {
            errors.push(ValidationError::new(
                "time.utc_offset",
                format!(
                    "invalid offset '{}': expected format '+HH:MM'",
                    self.utc_offset
                ),
            ));
        }

        errors
    }

    /// Clock for the configured offset.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] naming `time.utc_offset` if the offset is malformed.
    pub fn clock(&self) -> Result<CivilClock, ConfigError> {
        CivilClock::from_offset_str(&self.utc_offset)
            .map_err(|_| ConfigError::Validation(self.validate()))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `export.batch_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("luxlog")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert!(config.server.static_dir.is_none());
        assert_eq!(config.storage.path, luxlog_store::default_db_path());
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.pagination.max_limit, 1000);
        assert_eq!(config.export.batch_size, 500);
        assert_eq!(config.time.utc_offset, "+07:00");
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let config = Config {
            server: ServerConfig {
                bind: "127.0.0.1:8080".to_string(),
                static_dir: Some(PathBuf::from("front-end")),
            },
            storage: StorageConfig {
                path: PathBuf::from("/tmp/readings.db"),
            },
            pagination: PaginationConfig {
                default_limit: 25,
                max_limit: 200,
            },
            export: ExportConfig { batch_size: 64 },
            time: TimeConfig {
                utc_offset: "-05:00".to_string(),
            },
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();
        loaded.validate().unwrap();

        assert_eq!(loaded.server.bind, "127.0.0.1:8080");
        assert_eq!(loaded.server.static_dir, Some(PathBuf::from("front-end")));
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/readings.db"));
        assert_eq!(loaded.pagination.default_limit, 25);
        assert_eq!(loaded.pagination.max_limit, 200);
        assert_eq!(loaded.export.batch_size, 64);
        assert_eq!(loaded.time.utc_offset, "-05:00");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [server]
            static_dir = "front-end"

            [pagination]
            max_limit = 50
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.server.static_dir, Some(PathBuf::from("front-end")));
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.pagination.max_limit, 50);
        assert_eq!(config.export.batch_size, 500);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("luxlog/server.toml"));
    }

    #[test]
    fn test_server_bind_validation() {
        let bind = |addr: &str| ServerConfig {
            bind: addr.to_string(),
            static_dir: None,
        };

        assert!(bind("127.0.0.1:3000").validate().is_empty());
        assert!(bind("[::1]:3000").validate().is_empty());
        assert!(bind("localhost:3000").validate().is_empty());

        let errors = bind("").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));

        let errors = bind("127.0.0.1").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("host:port"));

        let errors = bind("127.0.0.1:0").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be 0"));

        let errors = bind("127.0.0.1:abc").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be a number"));
    }

    #[test]
    fn test_pagination_validation() {
        let limits = |default_limit, max_limit| PaginationConfig {
            default_limit,
            max_limit,
        };

        assert!(limits(10, 10).validate().is_empty());
        assert_eq!(limits(0, 10).validate()[0].field, "pagination.default_limit");
        assert_eq!(limits(10, 0).validate()[0].field, "pagination.max_limit");

        let errors = limits(50, 20).validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("exceeds"));
    }

    #[test]
    fn test_time_offset_validation() {
        let offset = |text: &str| TimeConfig {
            utc_offset: text.to_string(),
        };

        assert!(offset("+00:00").validate().is_empty());
        assert!(offset("-09:30").validate().is_empty());
        assert_eq!(offset("UTC+7").validate().len(), 1);
        assert_eq!(
            offset("-09:30").clock().unwrap().offset().whole_minutes(),
            -570
        );

        let Err(ConfigError::Validation(errors)) = offset("UTC+7").clock() else {
            panic!("expected a malformed offset to be rejected");
        };
        assert_eq!(errors[0].field, "time.utc_offset");
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let mut config = Config::default();
        config.server.bind = "nowhere".to_string();
        config.storage.path = PathBuf::new();
        config.export.batch_size = 0;
        config.time.utc_offset = "seven".to_string();

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind",
                "storage.path",
                "export.batch_size",
                "time.utc_offset"
            ]
        );

        let display = ConfigError::Validation(errors).to_string();
        assert!(display.contains("  - server.bind"));
        assert!(display.contains("  - time.utc_offset"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::new("server.bind", "invalid port");
        assert_eq!(format!("{}", error), "server.bind: invalid port");
    }
}
