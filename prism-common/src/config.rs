//! Bootstrap configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (resolved by the binary's argument parser)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! on defaults. A file that exists but does not parse is an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{Error, Result};

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub import: ImportConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit (the dashboard posts at most ~1 MB of rows)
    pub max_body_bytes: usize,
    /// Per-import deadline; exceeding it aborts without committing
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
            max_body_bytes: 1024 * 1024,
            request_timeout_ms: 30_000,
        }
    }
}

/// Snapshot store location
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data").join("sheet_snapshot.json"),
        }
    }
}

/// Import limits
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Largest batch accepted by the payload schema
    pub max_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { max_rows: 5000 }
    }
}

/// Read-side snapshot cache
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 0 disables caching
    pub snapshot_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Command-line / environment overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub snapshot_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load from `explicit` if given, else from the per-user default location.
    ///
    /// Missing files fall back to defaults with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    warn!("Could not determine config directory; using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!(
                "Config file not found at {}; using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides on top of file/default values
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(path) = overrides.snapshot_path {
            self.store.snapshot_path = path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(Error::Config(
                "server.max_body_bytes must be non-zero".to_string(),
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(Error::Config(
                "server.request_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.import.max_rows == 0 {
            return Err(Error::Config("import.max_rows must be non-zero".to_string()));
        }
        if self.store.snapshot_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "store.snapshot_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<user config dir>/prism/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("prism").join("config.toml"))
}
