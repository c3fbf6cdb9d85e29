// crates/lake-config/src/config.rs
// ============================================================================
// Module: Lake Configuration
// Description: Configuration loading and validation for the warehouse.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: lake-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file resolved from an explicit path,
//! then the `LAKE_CONFIG` environment variable, then `lake.toml` in the
//! working directory. Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use lake_store_sqlite::WarehouseConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "lake.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LAKE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a log filter directive.
pub(crate) const MAX_LOG_FILTER_LENGTH: usize = 1024;
/// Default warehouse database path.
const DEFAULT_WAREHOUSE_PATH: &str = "lake.db";
/// Default serviceability snapshot path.
const DEFAULT_SERVICEABILITY_SOURCE: &str = "program.json";
/// Default refresh interval in seconds.
pub(crate) const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
/// Maximum refresh interval in seconds.
pub(crate) const MAX_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;
/// Default usage query window in seconds.
pub(crate) const DEFAULT_QUERY_WINDOW_SECS: u64 = 60 * 60;
/// Maximum usage query window in seconds.
pub(crate) const MAX_QUERY_WINDOW_SECS: u64 = 90 * 24 * 60 * 60;
/// Default usage prerequisite timeout in seconds.
pub(crate) const DEFAULT_PREREQUISITE_TIMEOUT_SECS: u64 = 300;
/// Maximum usage prerequisite timeout in seconds.
pub(crate) const MAX_PREREQUISITE_TIMEOUT_SECS: u64 = 60 * 60;
/// Default block production refresh interval in seconds.
pub(crate) const DEFAULT_BLOCK_PRODUCTION_INTERVAL_SECS: u64 = 60 * 60;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Lake runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LakeConfig {
    /// Warehouse storage configuration.
    #[serde(default = "default_warehouse")]
    pub warehouse: WarehouseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Serviceability view configuration.
    #[serde(default)]
    pub serviceability: ServiceabilityConfig,
    /// Optional usage view configuration.
    #[serde(default)]
    pub usage: Option<UsageConfig>,
    /// Optional validator views configuration.
    #[serde(default)]
    pub validators: Option<ValidatorsConfig>,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            warehouse: default_warehouse(),
            logging: LoggingConfig::default(),
            serviceability: ServiceabilityConfig::default(),
            usage: None,
            validators: None,
        }
    }
}

impl LakeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_toml(content)?;
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.warehouse
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("warehouse: {err}")))?;
        self.logging.validate()?;
        self.serviceability.validate()?;
        if let Some(usage) = &self.usage {
            usage.validate()?;
        }
        if let Some(validators) = &self.validators {
            validators.validate()?;
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let filter = self.filter.trim();
        if filter.is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        if filter.len() > MAX_LOG_FILTER_LENGTH {
            return Err(ConfigError::Invalid("logging.filter exceeds max length".to_string()));
        }
        Ok(())
    }
}

/// Serviceability view configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceabilityConfig {
    /// Path to the JSON program snapshot.
    #[serde(default = "default_serviceability_source")]
    pub source_path: PathBuf,
    /// Seconds between refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for ServiceabilityConfig {
    fn default() -> Self {
        Self {
            source_path: default_serviceability_source(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl ServiceabilityConfig {
    /// Returns the refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validates serviceability configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("serviceability.source_path", &self.source_path)?;
        validate_range(
            "serviceability.refresh_interval_secs",
            self.refresh_interval_secs,
            MAX_REFRESH_INTERVAL_SECS,
        )
    }
}

/// Usage view configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Path to the JSON counter samples.
    pub source_path: PathBuf,
    /// Seconds between refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// How far back an initial refresh reaches, in seconds.
    #[serde(default = "default_query_window_secs")]
    pub query_window_secs: u64,
    /// How long to wait for the serviceability view, in seconds.
    #[serde(default = "default_prerequisite_timeout_secs")]
    pub prerequisite_timeout_secs: u64,
}

impl UsageConfig {
    /// Returns the refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Returns the initial query window.
    #[must_use]
    pub const fn query_window(&self) -> Duration {
        Duration::from_secs(self.query_window_secs)
    }

    /// Returns the prerequisite wait timeout.
    #[must_use]
    pub const fn prerequisite_timeout(&self) -> Duration {
        Duration::from_secs(self.prerequisite_timeout_secs)
    }

    /// Validates usage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("usage.source_path", &self.source_path)?;
        validate_range(
            "usage.refresh_interval_secs",
            self.refresh_interval_secs,
            MAX_REFRESH_INTERVAL_SECS,
        )?;
        validate_range("usage.query_window_secs", self.query_window_secs, MAX_QUERY_WINDOW_SECS)?;
        validate_range(
            "usage.prerequisite_timeout_secs",
            self.prerequisite_timeout_secs,
            MAX_PREREQUISITE_TIMEOUT_SECS,
        )
    }
}

/// Validator views configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorsConfig {
    /// Path to the JSON cluster snapshot.
    pub source_path: PathBuf,
    /// Seconds between validator set refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Seconds between block production refreshes.
    #[serde(default = "default_block_production_interval_secs")]
    pub block_production_interval_secs: u64,
}

impl ValidatorsConfig {
    /// Returns the validator set refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Returns the block production refresh interval.
    #[must_use]
    pub const fn block_production_interval(&self) -> Duration {
        Duration::from_secs(self.block_production_interval_secs)
    }

    /// Validates validator views configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("validators.source_path", &self.source_path)?;
        validate_range(
            "validators.refresh_interval_secs",
            self.refresh_interval_secs,
            MAX_REFRESH_INTERVAL_SECS,
        )?;
        validate_range(
            "validators.block_production_interval_secs",
            self.block_production_interval_secs,
            MAX_REFRESH_INTERVAL_SECS,
        )
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path field.
fn validate_path_string(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates `value` is within `1 ..= max`.
fn validate_range(field: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    if value > max {
        return Err(ConfigError::Invalid(format!("{field} must be at most {max}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default warehouse configuration.
fn default_warehouse() -> WarehouseConfig {
    WarehouseConfig::new(DEFAULT_WAREHOUSE_PATH)
}

/// Default log filter.
fn default_log_filter() -> String {
    "info".to_string()
}

/// Default serviceability snapshot path.
fn default_serviceability_source() -> PathBuf {
    PathBuf::from(DEFAULT_SERVICEABILITY_SOURCE)
}

/// Default refresh interval in seconds.
const fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

/// Default usage query window in seconds.
const fn default_query_window_secs() -> u64 {
    DEFAULT_QUERY_WINDOW_SECS
}

/// Default prerequisite timeout in seconds.
const fn default_prerequisite_timeout_secs() -> u64 {
    DEFAULT_PREREQUISITE_TIMEOUT_SECS
}

/// Default block production refresh interval in seconds.
const fn default_block_production_interval_secs() -> u64 {
    DEFAULT_BLOCK_PRODUCTION_INTERVAL_SECS
}

// ============================================================================
// SECTION: Tests
// ============================================================================
