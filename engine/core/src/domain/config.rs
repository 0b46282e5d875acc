// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Engine Configuration
//!
//! YAML manifest for the decision engine. Every field has a default so an
//! empty file (or no file at all) yields a working in-memory engine.
//!
//! ```yaml
//! thresholds:
//!   sss_helpful: 0.7
//!   confidence_threshold: 0.7
//! weights:
//!   cache_ttl_secs: 300
//!   shrinkage_k: 50.0
//! breaker:
//!   failure_threshold: 5
//!   open_timeout_ms: 30000
//! signals:
//!   timeout_ms: 2000
//! database:
//!   url: postgres://bellwether@localhost/bellwether
//! observability:
//!   log_level: info
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::breaker::BreakerConfig;
use crate::domain::follow_up::FollowUpConfig;
use crate::domain::thresholds::DecisionThresholds;
use crate::domain::weights::{WeightVector, DEFAULT_SHRINKAGE_K};

pub const CONFIG_PATH_ENV: &str = "BELLWETHER_CONFIG_PATH";
pub const DATABASE_URL_ENV: &str = "BELLWETHER_DATABASE_URL";
pub const LOG_LEVEL_ENV: &str = "BELLWETHER_LOG_LEVEL";
pub const SIGNAL_TIMEOUT_ENV: &str = "BELLWETHER_SIGNAL_TIMEOUT_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub thresholds: DecisionThresholds,

    #[serde(default)]
    pub weights: WeightConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub signals: SignalConfig,

    #[serde(default)]
    pub follow_ups: FollowUpConfig,

    /// Absent means in-memory stores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Prior used when the store has no GLOBAL vector
    #[serde(default = "WeightVector::global_default")]
    pub global_default: WeightVector,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// How often the background sweeper evicts expired cache entries
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Pseudo-count `k` in the `n / (n + k)` shrinkage blend
    #[serde(default = "default_shrinkage_k")]
    pub shrinkage_k: f64,
}

impl WeightConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            global_default: WeightVector::global_default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            shrinkage_k: default_shrinkage_k(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_shrinkage_k() -> f64 {
    DEFAULT_SHRINKAGE_K
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Per-call provider timeout; a timeout counts as a breaker failure
    #[serde(default = "default_signal_timeout_ms")]
    pub timeout_ms: u64,
}

impl SignalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_signal_timeout_ms(),
        }
    }
}

fn default_signal_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus scrape endpoint, e.g. `0.0.0.0:9464`. Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_listen: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_listen: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document parses to null, not to an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = self.to_yaml_string()?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Discover configuration file using precedence order
    /// 1. BELLWETHER_CONFIG_PATH environment variable
    /// 2. ./bellwether.yaml (working directory)
    /// 3. ~/.bellwether/config.yaml (user home)
    /// 4. /etc/bellwether/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %path.display(), "{} points at a missing file", CONFIG_PATH_ENV);
        }

        let cwd = PathBuf::from("./bellwether.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bellwether").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/bellwether/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load from an explicit path (which must exist), else from discovery,
    /// else defaults. Environment overrides are applied in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::debug!("No configuration file found in standard locations, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.is_empty() {
                tracing::info!("Environment override: {} set", DATABASE_URL_ENV);
                match self.database.as_mut() {
                    Some(db) => db.url = url,
                    None => {
                        self.database = Some(DatabaseConfig {
                            url,
                            max_connections: default_max_connections(),
                        })
                    }
                }
            }
        }

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.is_empty() {
                self.observability.log_level = level;
            }
        }

        if let Ok(val) = std::env::var(SIGNAL_TIMEOUT_ENV) {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: {}={}", SIGNAL_TIMEOUT_ENV, ms);
                    self.signals.timeout_ms = ms;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for {}: '{}'. Expected milliseconds. Ignoring.",
                        SIGNAL_TIMEOUT_ENV,
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate().map_err(ConfigError::Invalid)?;

        let global = &self.weights.global_default;
        global
            .check_shape()
            .map_err(|e| ConfigError::Invalid(format!("weights.global_default: {}", e)))?;
        if !global.is_global() {
            return Err(ConfigError::Invalid(
                "weights.global_default must have segment_type GLOBAL".to_string(),
            ));
        }

        if !self.weights.shrinkage_k.is_finite() || self.weights.shrinkage_k < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "weights.shrinkage_k must be a non-negative number, got {}",
                self.weights.shrinkage_k
            )));
        }
        if self.weights.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("weights.sweep_interval_secs cannot be 0".to_string()));
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid("breaker.failure_threshold cannot be 0".to_string()));
        }
        if self.breaker.open_timeout_ms == 0 {
            return Err(ConfigError::Invalid("breaker.open_timeout_ms cannot be 0".to_string()));
        }
        if self.signals.timeout_ms == 0 {
            return Err(ConfigError::Invalid("signals.timeout_ms cannot be 0".to_string()));
        }
        if self.follow_ups.engagement_check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "follow_ups.engagement_check_interval_secs cannot be 0".to_string(),
            ));
        }

        if let Some(db) = &self.database {
            if db.url.is_empty() {
                return Err(ConfigError::Invalid("database.url cannot be empty".to_string()));
            }
            if db.max_connections == 0 {
                return Err(ConfigError::Invalid("database.max_connections cannot be 0".to_string()));
            }
        }

        Ok(())
    }
}
