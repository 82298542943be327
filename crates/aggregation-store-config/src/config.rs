// crates/aggregation-store-config/src/config.rs
// ============================================================================
// Module: Aggregation Store Configuration
// Description: Configuration loading and validation for aggregation repositories.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: aggregation-store-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown fields, unknown session backends, and unknown backend options are
//! rejected during validation so a bad deployment fails before it connects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use aggregation_store_core::ColumnName;
use aggregation_store_core::ConsistencyLevel;
use aggregation_store_core::CqlValue;
use aggregation_store_core::FileAuditSink;
use aggregation_store_core::FixedPrefix;
use aggregation_store_core::NoopAuditSink;
use aggregation_store_core::PrefixColumn;
use aggregation_store_core::RepositoryAuditSink;
use aggregation_store_core::RepositorySettings;
use aggregation_store_core::StderrAuditSink;
use aggregation_store_core::TableName;
use serde::Deserialize;
use thiserror::Error;

use crate::registry::SessionBackendRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "aggregation-store.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "AGGREGATION_STORE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of fixed prefix columns.
pub const MAX_PREFIX_COLUMNS: usize = 16;
/// Session backend used when none is configured.
const DEFAULT_SESSION_BACKEND: &str = "memory";

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Aggregation store configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationStoreConfig {
    /// Repository table, column, and consistency settings.
    pub repository: RepositoryConfig,
    /// Session backend selection.
    #[serde(default)]
    pub session: SessionConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AggregationStoreConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path argument wins, then [`CONFIG_ENV_VAR`], then
    /// `aggregation-store.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration against the built-in session backends.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with(&SessionBackendRegistry::with_builtins())
    }

    /// Validates the configuration against a custom backend registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate_with(&self, registry: &SessionBackendRegistry) -> Result<(), ConfigError> {
        self.repository.to_settings()?;
        registry.resolve(&self.session.backend)?.validate_options(&self.session.options)?;
        self.audit.validate()
    }

    /// Returns validated repository settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when identifiers, prefix, or TTL are invalid.
    pub fn repository_settings(&self) -> Result<RepositorySettings, ConfigError> {
        self.repository.to_settings()
    }
}

// ============================================================================
// SECTION: Repository Config
// ============================================================================

/// Repository table and column configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Table name, optionally keyspace-qualified.
    pub table: String,
    /// Column holding the aggregation key.
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// Column holding the exchange id.
    #[serde(default = "default_exchange_id_column")]
    pub exchange_id_column: String,
    /// Column holding the serialized payload.
    #[serde(default = "default_payload_column")]
    pub payload_column: String,
    /// Optional row time-to-live in seconds.
    #[serde(default)]
    pub ttl_seconds: Option<u32>,
    /// Consistency level for reads.
    #[serde(default)]
    pub read_consistency: ConsistencyLevel,
    /// Consistency level for writes.
    #[serde(default)]
    pub write_consistency: ConsistencyLevel,
    /// Ordered fixed prefix columns.
    #[serde(default)]
    pub fixed_prefix: Vec<PrefixEntryConfig>,
}

impl RepositoryConfig {
    /// Converts the raw config into validated repository settings.
    fn to_settings(&self) -> Result<RepositorySettings, ConfigError> {
        if self.fixed_prefix.len() > MAX_PREFIX_COLUMNS {
            return Err(ConfigError::Invalid(format!(
                "repository.fixed_prefix exceeds {MAX_PREFIX_COLUMNS} columns"
            )));
        }
        let table = TableName::new(&self.table).map_err(invalid("repository.table"))?;
        let columns = self
            .fixed_prefix
            .iter()
            .map(PrefixEntryConfig::to_column)
            .collect::<Result<Vec<_>, _>>()?;
        let fixed_prefix = FixedPrefix::new(columns).map_err(invalid("repository.fixed_prefix"))?;
        let mut settings = RepositorySettings::new(table).with_fixed_prefix(fixed_prefix);
        settings.key_column =
            ColumnName::new(self.key_column.as_str()).map_err(invalid("repository.key_column"))?;
        settings.exchange_id_column = ColumnName::new(self.exchange_id_column.as_str())
            .map_err(invalid("repository.exchange_id_column"))?;
        settings.payload_column = ColumnName::new(self.payload_column.as_str())
            .map_err(invalid("repository.payload_column"))?;
        settings.ttl_seconds = self.ttl_seconds;
        settings.read_consistency = self.read_consistency;
        settings.write_consistency = self.write_consistency;
        settings.validate().map_err(invalid("repository"))?;
        Ok(settings)
    }
}

/// One fixed prefix column and its constant value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixEntryConfig {
    /// Column name.
    pub column: String,
    /// Constant value written and filtered on.
    pub value: PrefixValueConfig,
}

impl PrefixEntryConfig {
    /// Converts the entry into a typed prefix column.
    fn to_column(&self) -> Result<PrefixColumn, ConfigError> {
        let column = ColumnName::new(self.column.as_str())
            .map_err(invalid("repository.fixed_prefix.column"))?;
        let value = match &self.value {
            PrefixValueConfig::Text(text) => CqlValue::Text(text.clone()),
            PrefixValueConfig::Boolean(flag) => CqlValue::Boolean(*flag),
        };
        Ok(PrefixColumn::new(column, value))
    }
}

/// Prefix value as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PrefixValueConfig {
    /// Text column value.
    Text(String),
    /// Boolean column value.
    Boolean(bool),
}

// ============================================================================
// SECTION: Session Config
// ============================================================================

/// Session backend selection and backend-specific options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Registered backend name.
    #[serde(default = "default_session_backend")]
    pub backend: String,
    /// Backend options, checked against the backend's declared option names.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            options: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Audit Config
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// Append-only JSON lines file.
    File,
}

/// Audit sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates sink and path pairing.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn RepositoryAuditSink>, ConfigError> {
        self.validate()?;
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            _ => Ok(Arc::new(NoopAuditSink)),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
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

/// Returns the default aggregation key column.
fn default_key_column() -> String {
    "aggregation_key".to_string()
}

/// Returns the default exchange id column.
fn default_exchange_id_column() -> String {
    "exchange_id".to_string()
}

/// Returns the default payload column.
fn default_payload_column() -> String {
    "exchange".to_string()
}

/// Returns the default session backend name.
fn default_session_backend() -> String {
    DEFAULT_SESSION_BACKEND.to_string()
}

/// Builds an error mapper that prefixes the offending field.
fn invalid<E: std::fmt::Display>(field: &'static str) -> impl Fn(E) -> ConfigError {
    move |err| ConfigError::Invalid(format!("{field}: {err}"))
}

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

/// Validates the resolved path against security limits.
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

/// Validates a path string against length constraints.
pub(crate) fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
