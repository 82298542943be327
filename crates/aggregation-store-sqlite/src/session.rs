// crates/aggregation-store-sqlite/src/session.rs
// ============================================================================
// Module: SQLite Aggregation Session
// Description: Durable Session backed by a single guarded SQLite connection.
// Purpose: Persist aggregation rows across process restarts on one node.
// Dependencies: aggregation-store-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements the aggregation [`Session`] contract over `SQLite`.
//! The table is created on first prepare from the statement layout, each
//! template is translated to SQL and compile-checked, and time-to-live is
//! stored as an expiry timestamp filtered on every read. The conditional
//! delete is a single `DELETE` predicated on the exchange id whose change count
//! becomes the `[applied]` flag, so it is atomic per row. Consistency levels
//! are accepted and ignored; `SQLite` has a single replica.
//! Security posture: identifiers are validated before reaching SQL and every
//! value is bound as a parameter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use aggregation_store_core::BoundStatement;
use aggregation_store_core::ColumnKind;
use aggregation_store_core::ColumnName;
use aggregation_store_core::CqlValue;
use aggregation_store_core::PreparedStatement;
use aggregation_store_core::ResultSet;
use aggregation_store_core::Row;
use aggregation_store_core::Session;
use aggregation_store_core::SessionConnector;
use aggregation_store_core::SessionError;
use aggregation_store_core::SharedSession;
use aggregation_store_core::StatementKind;
use aggregation_store_core::StatementTemplate;
use aggregation_store_core::TableLayout;
use aggregation_store_core::runtime::memory::Clock;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hidden column holding the row expiry in unix milliseconds.
pub const EXPIRY_COLUMN: &str = "__expires_at_ms";
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteSessionConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteSessionConfig {
    /// Creates a config with default durability settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }

    /// Validates path limits.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError::Invalid`] when the path is unusable.
    pub fn validate(&self) -> Result<(), SqliteSessionError> {
        validate_store_path(&self.path)
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` session errors.
#[derive(Debug, Error)]
pub enum SqliteSessionError {
    /// Filesystem error.
    #[error("sqlite session io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite session db error: {0}")]
    Db(String),
    /// Invalid configuration.
    #[error("sqlite session invalid config: {0}")]
    Invalid(String),
}

impl From<SqliteSessionError> for SessionError {
    fn from(error: SqliteSessionError) -> Self {
        match error {
            SqliteSessionError::Io(_) | SqliteSessionError::Invalid(_) => {
                Self::Connection(error.to_string())
            }
            SqliteSessionError::Db(message) => Self::Execution(message),
        }
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Connection state guarded by the session mutex.
struct SessionState {
    /// Open connection.
    connection: Connection,
    /// Layouts of tables created through this session.
    tables: BTreeMap<String, TableLayout>,
}

/// `SQLite`-backed aggregation session.
///
/// # Invariants
/// - All statements run on one connection under one mutex.
/// - `None` state means the session is closed.
pub struct SqliteSession {
    /// Session configuration.
    config: SqliteSessionConfig,
    /// Connection and table registry.
    state: Mutex<Option<SessionState>>,
    /// Millisecond clock used for expiry.
    clock: Clock,
}

impl SqliteSession {
    /// Opens the database, creating it and its parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when the path is invalid or the database
    /// cannot be opened.
    pub fn open(config: SqliteSessionConfig) -> Result<Self, SqliteSessionError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(&config)?;
        Ok(Self {
            config,
            state: Mutex::new(Some(SessionState {
                connection,
                tables: BTreeMap::new(),
            })),
            clock: Arc::new(unix_millis),
        })
    }

    /// Replaces the expiry clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteSessionConfig {
        &self.config
    }

    /// Deletes expired rows from every table prepared through this session.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when the session is closed or a delete fails.
    pub fn purge_expired(&self) -> Result<usize, SqliteSessionError> {
        let now = self.now();
        let guard = self
            .state
            .lock()
            .map_err(|_| SqliteSessionError::Db("mutex poisoned".to_string()))?;
        let state =
            guard.as_ref().ok_or_else(|| SqliteSessionError::Db("session closed".to_string()))?;
        let mut purged = 0;
        for table in state.tables.keys() {
            let sql = format!(
                "DELETE FROM {} WHERE {} IS NOT NULL AND {} <= ?1",
                quote(table),
                quote(EXPIRY_COLUMN),
                quote(EXPIRY_COLUMN)
            );
            purged += state
                .connection
                .execute(&sql, [now])
                .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
        }
        drop(guard);
        Ok(purged)
    }

    /// Returns the current clock reading as a `SQLite` integer.
    fn now(&self) -> i64 {
        i64::try_from((self.clock)()).unwrap_or(i64::MAX)
    }
}

impl Session for SqliteSession {
    fn prepare(&self, template: &StatementTemplate) -> Result<PreparedStatement, SessionError> {
        let layout = &template.layout;
        if layout.table.keyspace().is_some() {
            return Err(SessionError::Unsupported(format!(
                "sqlite tables cannot be keyspace-qualified: {}",
                layout.table
            )));
        }
        if layout.columns().any(|spec| spec.name.as_str() == EXPIRY_COLUMN) {
            return Err(SessionError::Unsupported(format!("column name {EXPIRY_COLUMN} is reserved")));
        }
        let sql = translate(template)?;
        let mut guard =
            self.state.lock().map_err(|_| SessionError::Prepare("mutex poisoned".to_string()))?;
        let state = guard.as_mut().ok_or(SessionError::Closed)?;
        let table = layout.table.name().to_string();
        match state.tables.get(&table) {
            Some(existing) if existing != layout.as_ref() => {
                return Err(SessionError::Prepare(format!(
                    "table {table} already prepared with a different layout"
                )));
            }
            Some(_) => {}
            None => {
                state
                    .connection
                    .execute_batch(&create_table_sql(layout))
                    .map_err(|err| SessionError::Prepare(err.to_string()))?;
                state.tables.insert(table, layout.as_ref().clone());
            }
        }
        state
            .connection
            .prepare_cached(&sql)
            .map_err(|err| SessionError::Prepare(format!("{}: {err}", template.kind)))?;
        drop(guard);
        Ok(PreparedStatement::new(template.clone(), sql))
    }

    fn execute(&self, statement: &BoundStatement) -> Result<ResultSet, SessionError> {
        let template = statement.template();
        let now = self.now();
        let mut params: Vec<Value> = statement.values().iter().map(to_sql_value).collect();
        let guard =
            self.state.lock().map_err(|_| SessionError::Execution("mutex poisoned".to_string()))?;
        let state = guard.as_ref().ok_or(SessionError::Closed)?;
        let mut prepared = state.connection.prepare_cached(statement.statement().native()).map_err(db)?;
        let result = match template.kind {
            StatementKind::Insert => {
                let expiry = template.ttl_seconds.map_or(Value::Null, |ttl| {
                    Value::Integer(now.saturating_add(i64::from(ttl).saturating_mul(1000)))
                });
                params.push(expiry);
                prepared.execute(params_from_iter(params)).map_err(db)?;
                ResultSet::empty()
            }
            StatementKind::DeleteByKey => {
                prepared.execute(params_from_iter(params)).map_err(db)?;
                ResultSet::empty()
            }
            StatementKind::ConditionalDelete => {
                params.push(Value::Integer(now));
                let changed = prepared.execute(params_from_iter(params)).map_err(db)?;
                ResultSet::applied_flag(changed > 0)
            }
            StatementKind::SelectByKey | StatementKind::SelectKeyAndId => {
                params.push(Value::Integer(now));
                let mut rows = prepared.query(params_from_iter(params)).map_err(db)?;
                let mut output = Vec::new();
                while let Some(row) = rows.next().map_err(db)? {
                    output.push(read_row(template, row)?);
                }
                ResultSet::from_rows(output)
            }
        };
        drop(prepared);
        drop(guard);
        Ok(result)
    }

    fn close(&self) -> Result<(), SessionError> {
        let mut guard =
            self.state.lock().map_err(|_| SessionError::Execution("mutex poisoned".to_string()))?;
        let state = guard.take();
        drop(guard);
        if let Some(state) = state {
            state.connection.close().map_err(|(_, err)| SessionError::Execution(err.to_string()))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Connector that opens a new `SQLite` session per connect.
#[derive(Clone)]
pub struct SqliteConnector {
    /// Session configuration.
    config: SqliteSessionConfig,
    /// Optional clock override.
    clock: Option<Clock>,
}

impl SqliteConnector {
    /// Creates a connector for a config.
    #[must_use]
    pub const fn new(config: SqliteSessionConfig) -> Self {
        Self {
            config,
            clock: None,
        }
    }

    /// Uses a custom expiry clock for every session.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl SessionConnector for SqliteConnector {
    fn connect(&self) -> Result<SharedSession, SessionError> {
        let mut session = SqliteSession::open(self.config.clone())?;
        if let Some(clock) = &self.clock {
            session = session.with_clock(Arc::clone(clock));
        }
        Ok(Arc::new(session))
    }
}

// ============================================================================
// SECTION: SQL Translation
// ============================================================================

/// Quotes a validated identifier.
fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

/// Maps a column kind to its `SQLite` storage type.
const fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text => "TEXT",
        ColumnKind::Blob => "BLOB",
        ColumnKind::Boolean => "INTEGER",
    }
}

/// Builds the `CREATE TABLE` statement for a layout.
fn create_table_sql(layout: &TableLayout) -> String {
    let mut columns: Vec<String> = layout
        .columns()
        .map(|spec| format!("{} {} NOT NULL", quote(spec.name.as_str()), sql_type(spec.kind)))
        .collect();
    columns.push(format!("{} INTEGER", quote(EXPIRY_COLUMN)));
    let key: Vec<String> = layout.primary_key.iter().map(|spec| quote(spec.name.as_str())).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}));",
        quote(layout.table.name()),
        columns.join(", "),
        key.join(", ")
    )
}

/// Builds numbered equality predicates starting at `?1`.
fn equality_predicates(columns: &[ColumnName]) -> Vec<String> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{} = ?{}", quote(column.as_str()), index + 1))
        .collect()
}

/// Builds the unexpired-row predicate bound at parameter `index`.
fn live_predicate(index: usize) -> String {
    format!("({0} IS NULL OR {0} > ?{index})", quote(EXPIRY_COLUMN))
}

/// Translates a template to SQL with numbered parameters.
fn translate(template: &StatementTemplate) -> Result<String, SessionError> {
    let table = quote(template.layout.table.name());
    let mut predicates = equality_predicates(&template.filter);
    let sql = match template.kind {
        StatementKind::Insert => {
            let mut columns: Vec<String> =
                template.projection.iter().map(|column| quote(column.as_str())).collect();
            columns.push(quote(EXPIRY_COLUMN));
            let markers: Vec<String> = (1 ..= columns.len()).map(|index| format!("?{index}")).collect();
            format!(
                "INSERT OR REPLACE INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                markers.join(", ")
            )
        }
        StatementKind::SelectByKey | StatementKind::SelectKeyAndId => {
            predicates.push(live_predicate(template.filter.len() + 1));
            let projection: Vec<String> =
                template.projection.iter().map(|column| quote(column.as_str())).collect();
            format!(
                "SELECT {} FROM {table} WHERE {}",
                projection.join(", "),
                predicates.join(" AND ")
            )
        }
        StatementKind::DeleteByKey => {
            if predicates.is_empty() {
                return Err(SessionError::Unsupported(
                    "delete without a key filter".to_string(),
                ));
            }
            format!("DELETE FROM {table} WHERE {}", predicates.join(" AND "))
        }
        StatementKind::ConditionalDelete => {
            let condition = template.condition.as_ref().ok_or_else(|| {
                SessionError::Unsupported("conditional delete without condition".to_string())
            })?;
            let index = template.filter.len() + 1;
            predicates.push(format!("{} = ?{index}", quote(condition.as_str())));
            predicates.push(live_predicate(index + 1));
            format!("DELETE FROM {table} WHERE {}", predicates.join(" AND "))
        }
    };
    Ok(sql)
}

// ============================================================================
// SECTION: Value Mapping
// ============================================================================

/// Converts a bound value to a `SQLite` value.
fn to_sql_value(value: &CqlValue) -> Value {
    match value {
        CqlValue::Text(text) => Value::Text(text.clone()),
        CqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        CqlValue::Boolean(flag) => Value::Integer(i64::from(*flag)),
    }
}

/// Reads a projected row back into typed column values.
fn read_row(template: &StatementTemplate, row: &rusqlite::Row<'_>) -> Result<Row, SessionError> {
    let mut output = Row::new();
    for (index, column) in template.projection.iter().enumerate() {
        let kind = template
            .layout
            .column(column)
            .map(|spec| spec.kind)
            .ok_or_else(|| SessionError::Execution(format!("unknown column {column}")))?;
        let raw: Value = row.get(index).map_err(db)?;
        let value = match (kind, raw) {
            (ColumnKind::Text, Value::Text(text)) => CqlValue::Text(text),
            (ColumnKind::Blob, Value::Blob(bytes)) => CqlValue::Blob(bytes),
            (ColumnKind::Boolean, Value::Integer(flag)) => CqlValue::Boolean(flag != 0),
            (kind, _) => {
                return Err(SessionError::Execution(format!(
                    "column {column} does not hold {kind} data"
                )));
            }
        };
        output.insert(column.as_str(), value);
    }
    Ok(output)
}

/// Maps an engine error to an execution error.
fn db(err: rusqlite::Error) -> SessionError {
    SessionError::Execution(err.to_string())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteSessionError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteSessionError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteSessionError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteSessionError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteSessionError::Invalid("store path must be non-empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteSessionError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteSessionError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteSessionError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteSessionConfig) -> Result<Connection, SqliteSessionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteSessionConfig,
) -> Result<(), SqliteSessionError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> u64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(now.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
