// crates/aggregation-store-config/src/registry.rs
// ============================================================================
// Module: Session Backend Registry
// Description: Name-to-constructor mapping for session backends.
// Purpose: Resolve and validate session backends at configuration time.
// Dependencies: aggregation-store-core, aggregation-store-sqlite, toml
// ============================================================================

//! ## Overview
//! A backend is a name, a declared set of typed options, and a factory that
//! turns validated options into a [`SessionConnector`]. The registry rejects
//! unknown backend names, unknown option names, mistyped options, and missing
//! required options before any connection is opened.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use aggregation_store_core::InMemoryConnector;
use aggregation_store_core::SessionConnector;
use aggregation_store_sqlite::SqliteConnector;
use aggregation_store_sqlite::SqliteJournalMode;
use aggregation_store_sqlite::SqliteSessionConfig;
use aggregation_store_sqlite::SqliteSyncMode;

use crate::config::ConfigError;
use crate::config::SessionConfig;
use crate::config::validate_path_string;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Factory turning validated options into a connector.
///
/// Factories convert and check option values but must not connect; the
/// connector only opens a session at repository start. Config validation runs
/// the factory and discards the connector.
pub type ConnectorFactory =
    fn(&BTreeMap<String, toml::Value>) -> Result<Box<dyn SessionConnector>, ConfigError>;

/// Value type accepted by a backend option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// TOML string.
    String,
    /// TOML integer.
    Integer,
    /// TOML boolean.
    Boolean,
}

impl OptionKind {
    /// Returns the kind label used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    /// Returns true when the value has this kind.
    #[must_use]
    pub const fn matches(self, value: &toml::Value) -> bool {
        matches!(
            (self, value),
            (Self::String, toml::Value::String(_))
                | (Self::Integer, toml::Value::Integer(_))
                | (Self::Boolean, toml::Value::Boolean(_))
        )
    }
}

/// Declared option accepted by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOption {
    /// Option name under `[session.options]`.
    pub name: &'static str,
    /// Expected value kind.
    pub kind: OptionKind,
    /// Whether the option must be present.
    pub required: bool,
}

impl BackendOption {
    /// Declares a required option.
    #[must_use]
    pub const fn required(name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// Declares an optional option.
    #[must_use]
    pub const fn optional(name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Registered session backend.
#[derive(Clone)]
pub struct SessionBackend {
    /// Backend name.
    pub name: String,
    /// Declared options.
    pub options: Vec<BackendOption>,
    /// Connector factory.
    pub factory: ConnectorFactory,
}

impl SessionBackend {
    /// Checks options against the declared names and kinds, then runs the
    /// factory so value-level errors surface without starting a session.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown, mistyped, missing, or
    /// out-of-range options.
    pub fn validate_options(
        &self,
        options: &BTreeMap<String, toml::Value>,
    ) -> Result<(), ConfigError> {
        self.check_declared(options)?;
        (self.factory)(options).map(|_| ())
    }

    /// Checks option names, kinds, and required presence.
    fn check_declared(&self, options: &BTreeMap<String, toml::Value>) -> Result<(), ConfigError> {
        for (name, value) in options {
            let Some(declared) = self.options.iter().find(|option| option.name == name.as_str()) else {
                return Err(ConfigError::Invalid(format!(
                    "session.options.{name} is not supported by backend {}",
                    self.name
                )));
            };
            if !declared.kind.matches(value) {
                return Err(ConfigError::Invalid(format!(
                    "session.options.{name} must be a {}",
                    declared.kind.as_str()
                )));
            }
        }
        for option in self.options.iter().filter(|option| option.required) {
            if !options.contains_key(option.name) {
                return Err(ConfigError::Invalid(format!(
                    "session.options.{} is required by backend {}",
                    option.name, self.name
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of session backends keyed by name.
#[derive(Clone, Default)]
pub struct SessionBackendRegistry {
    /// Backends keyed by name.
    backends: BTreeMap<String, SessionBackend>,
}

impl SessionBackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the `memory` and `sqlite` backends.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut backends = BTreeMap::new();
        for backend in [memory_backend(), sqlite_backend()] {
            backends.insert(backend.name.clone(), backend);
        }
        Self {
            backends,
        }
    }

    /// Registers a backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the name is empty or taken.
    pub fn register(&mut self, backend: SessionBackend) -> Result<(), ConfigError> {
        if backend.name.trim().is_empty() {
            return Err(ConfigError::Invalid("session backend name must be non-empty".to_string()));
        }
        if self.backends.contains_key(&backend.name) {
            return Err(ConfigError::Invalid(format!(
                "session backend {} is already registered",
                backend.name
            )));
        }
        self.backends.insert(backend.name.clone(), backend);
        Ok(())
    }

    /// Resolves a backend by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown names.
    pub fn resolve(&self, name: &str) -> Result<&SessionBackend, ConfigError> {
        self.backends.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            ConfigError::Invalid(format!(
                "unknown session backend {name} (known: {})",
                known.join(", ")
            ))
        })
    }

    /// Returns registered backend names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Validates options and builds a connector for the session config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown backends or bad options.
    pub fn build_connector(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn SessionConnector>, ConfigError> {
        let backend = self.resolve(&config.backend)?;
        backend.check_declared(&config.options)?;
        (backend.factory)(&config.options)
    }
}

// ============================================================================
// SECTION: Built-in Backends
// ============================================================================

/// In-memory backend; each start gets a fresh, empty session.
fn memory_backend() -> SessionBackend {
    SessionBackend {
        name: "memory".to_string(),
        options: Vec::new(),
        factory: |_| Ok(Box::new(InMemoryConnector::new())),
    }
}

/// `SQLite` backend.
fn sqlite_backend() -> SessionBackend {
    SessionBackend {
        name: "sqlite".to_string(),
        options: vec![
            BackendOption::required("path", OptionKind::String),
            BackendOption::optional("busy_timeout_ms", OptionKind::Integer),
            BackendOption::optional("journal_mode", OptionKind::String),
            BackendOption::optional("sync_mode", OptionKind::String),
        ],
        factory: sqlite_connector,
    }
}

/// Builds a `SQLite` connector from validated options.
fn sqlite_connector(
    options: &BTreeMap<String, toml::Value>,
) -> Result<Box<dyn SessionConnector>, ConfigError> {
    let path = string_option(options, "path")
        .ok_or_else(|| ConfigError::Invalid("session.options.path is required".to_string()))?;
    validate_path_string("session.options.path", path)?;
    let mut config = SqliteSessionConfig::new(path);
    if let Some(toml::Value::Integer(timeout)) = options.get("busy_timeout_ms") {
        config.busy_timeout_ms = u64::try_from(*timeout).map_err(|_| {
            ConfigError::Invalid("session.options.busy_timeout_ms must be non-negative".to_string())
        })?;
    }
    config.journal_mode = match string_option(options, "journal_mode") {
        None | Some("wal") => SqliteJournalMode::Wal,
        Some("delete") => SqliteJournalMode::Delete,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "session.options.journal_mode must be wal or delete, got {other}"
            )));
        }
    };
    config.sync_mode = match string_option(options, "sync_mode") {
        None | Some("full") => SqliteSyncMode::Full,
        Some("normal") => SqliteSyncMode::Normal,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "session.options.sync_mode must be full or normal, got {other}"
            )));
        }
    };
    config.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(Box::new(SqliteConnector::new(config)))
}

/// Returns a string option when present.
fn string_option<'a>(options: &'a BTreeMap<String, toml::Value>, name: &str) -> Option<&'a str> {
    options.get(name).and_then(toml::Value::as_str)
}
