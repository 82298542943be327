// crates/aggregation-store-core/src/runtime/memory.rs
// ============================================================================
// Module: Aggregation Store In-Memory Session
// Description: Mutex-guarded session backend for tests and local demos.
// Purpose: Interpret statement templates over an ordered map without a server.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemorySession`] keeps one ordered map per table, keyed by the full
//! primary key. Statements are interpreted from their templates, conditional
//! deletes compare and delete under a single lock, and time-to-live is
//! enforced lazily on access against an injectable clock. The session also
//! counts executions per statement kind and consistency level so callers can
//! check which level each category used. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::ColumnName;
use crate::core::ConsistencyLevel;
use crate::core::CqlValue;
use crate::core::StatementKind;
use crate::core::StatementTemplate;
use crate::core::TableLayout;
use crate::interfaces::BoundStatement;
use crate::interfaces::PreparedStatement;
use crate::interfaces::ResultSet;
use crate::interfaces::Row;
use crate::interfaces::Session;
use crate::interfaces::SessionConnector;
use crate::interfaces::SessionError;
use crate::interfaces::SharedSession;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Millisecond clock used for time-to-live checks.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Execution counts keyed by statement kind and consistency level.
pub type UsageCounts = BTreeMap<(StatementKind, ConsistencyLevel), u64>;

/// Non-key column values of one stored row.
#[derive(Debug, Clone)]
struct StoredRow {
    /// Regular column values by name.
    values: BTreeMap<String, CqlValue>,
    /// Expiry instant in clock milliseconds, when a TTL was applied.
    expires_at_ms: Option<u64>,
}

impl StoredRow {
    /// Returns true when the row has expired at `now_ms`.
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|expires| expires <= now_ms)
    }
}

/// Rows and layout of one table.
#[derive(Debug)]
struct MemoryTable {
    /// Layout registered by the first prepare.
    layout: TableLayout,
    /// Rows keyed by full primary key.
    rows: BTreeMap<Vec<CqlValue>, StoredRow>,
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// In-memory session for tests and examples.
///
/// # Invariants
/// - All row access happens under the `tables` mutex, so conditional deletes
///   are atomic per row.
pub struct InMemorySession {
    /// Tables keyed by qualified name.
    tables: Mutex<BTreeMap<String, MemoryTable>>,
    /// Execution counts per kind and consistency level.
    usage: Mutex<UsageCounts>,
    /// Set once the session is closed.
    closed: AtomicBool,
    /// Clock used for expiry.
    clock: Clock,
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySession {
    /// Creates a session backed by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(system_clock_ms))
    }

    /// Creates a session backed by a custom clock.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            usage: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
            clock,
        }
    }

    /// Returns execution counts per statement kind and consistency level.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Execution`] when the usage mutex is poisoned.
    pub fn usage(&self) -> Result<UsageCounts, SessionError> {
        Ok(self.usage.lock().map_err(|_| poisoned("usage"))?.clone())
    }

    /// Returns the number of unexpired rows in a table.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Execution`] when the table mutex is poisoned.
    pub fn row_count(&self, table: &str) -> Result<usize, SessionError> {
        let now = (self.clock)();
        let guard = self.tables.lock().map_err(|_| poisoned("table"))?;
        Ok(guard
            .get(table)
            .map_or(0, |entry| entry.rows.values().filter(|row| !row.is_expired(now)).count()))
    }

    /// Returns true once [`Session::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fails when the session is closed.
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() { Err(SessionError::Closed) } else { Ok(()) }
    }

    /// Increments the usage counter for a template.
    fn record_usage(&self, template: &StatementTemplate) -> Result<(), SessionError> {
        let mut usage = self.usage.lock().map_err(|_| poisoned("usage"))?;
        *usage.entry((template.kind, template.consistency)).or_insert(0) += 1;
        drop(usage);
        Ok(())
    }
}

impl Session for InMemorySession {
    fn prepare(&self, template: &StatementTemplate) -> Result<PreparedStatement, SessionError> {
        self.ensure_open()?;
        validate_template(template)?;
        let table_name = template.layout.table.to_string();
        let mut tables = self.tables.lock().map_err(|_| poisoned("table"))?;
        match tables.get(&table_name) {
            Some(existing) if existing.layout != *template.layout => {
                return Err(SessionError::Prepare(format!(
                    "table {table_name} already registered with a different layout"
                )));
            }
            Some(_) => {}
            None => {
                tables.insert(
                    table_name,
                    MemoryTable {
                        layout: (*template.layout).clone(),
                        rows: BTreeMap::new(),
                    },
                );
            }
        }
        drop(tables);
        Ok(PreparedStatement::new(template.clone(), template.cql()))
    }

    fn execute(&self, statement: &BoundStatement) -> Result<ResultSet, SessionError> {
        self.ensure_open()?;
        let template = statement.template();
        self.record_usage(template)?;
        let now = (self.clock)();
        let table_name = template.layout.table.to_string();
        let mut tables = self.tables.lock().map_err(|_| poisoned("table"))?;
        let table = tables
            .get_mut(&table_name)
            .ok_or_else(|| SessionError::Execution(format!("unknown table {table_name}")))?;
        let key_len = table.layout.primary_key.len();
        let values = statement.values();
        let result = match template.kind {
            StatementKind::Insert => {
                let mut key = Vec::with_capacity(key_len);
                for spec in &table.layout.primary_key {
                    key.push(bound_value(statement, &spec.name)?.clone());
                }
                let mut stored = BTreeMap::new();
                for spec in &table.layout.regular {
                    stored.insert(
                        spec.name.as_str().to_string(),
                        bound_value(statement, &spec.name)?.clone(),
                    );
                }
                let expires_at_ms = template
                    .ttl_seconds
                    .map(|ttl| now.saturating_add(u64::from(ttl).saturating_mul(1000)));
                table.rows.insert(
                    key,
                    StoredRow {
                        values: stored,
                        expires_at_ms,
                    },
                );
                ResultSet::empty()
            }
            StatementKind::SelectByKey => {
                if table.rows.get(values).is_some_and(|row| row.is_expired(now)) {
                    table.rows.remove(values);
                }
                let rows = table
                    .rows
                    .get(values)
                    .map(|row| project(&table.layout, &template.projection, values, row))
                    .into_iter()
                    .collect();
                ResultSet::from_rows(rows)
            }
            StatementKind::DeleteByKey => {
                table.rows.remove(values);
                ResultSet::empty()
            }
            StatementKind::SelectKeyAndId => {
                table.rows.retain(|_, row| !row.is_expired(now));
                let rows = table
                    .rows
                    .iter()
                    .filter(|(key, _)| key.starts_with(values))
                    .map(|(key, row)| project(&table.layout, &template.projection, key, row))
                    .collect();
                ResultSet::from_rows(rows)
            }
            StatementKind::ConditionalDelete => {
                let condition = template.condition.as_ref().ok_or_else(|| {
                    SessionError::Execution("conditional delete without condition".to_string())
                })?;
                let expected = bound_value(statement, condition)?;
                let key = values.get(.. key_len).unwrap_or_default();
                let applied = match table.rows.get(key) {
                    Some(row) if row.is_expired(now) => false,
                    Some(row) => row.values.get(condition.as_str()) == Some(expected),
                    None => false,
                };
                if applied {
                    table.rows.remove(key);
                }
                ResultSet::applied_flag(applied)
            }
        };
        drop(tables);
        Ok(result)
    }

    fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Connector that opens a fresh in-memory session per connect.
#[derive(Default)]
pub struct InMemoryConnector {
    /// Sessions opened so far, oldest first.
    sessions: Mutex<Vec<Arc<InMemorySession>>>,
}

impl InMemoryConnector {
    /// Creates a connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently opened session.
    #[must_use]
    pub fn last_session(&self) -> Option<Arc<InMemorySession>> {
        self.sessions.lock().ok().and_then(|sessions| sessions.last().cloned())
    }

    /// Returns the number of sessions opened so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }
}

impl SessionConnector for InMemoryConnector {
    fn connect(&self) -> Result<SharedSession, SessionError> {
        let session = Arc::new(InMemorySession::new());
        self.sessions
            .lock()
            .map_err(|_| SessionError::Connection("connector mutex poisoned".to_string()))?
            .push(Arc::clone(&session));
        Ok(session)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the system time in milliseconds since the epoch.
fn system_clock_ms() -> u64 {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Builds a mutex poisoning error.
fn poisoned(label: &str) -> SessionError {
    SessionError::Execution(format!("in-memory session {label} mutex poisoned"))
}

/// Checks that a template is interpretable over its layout.
fn validate_template(template: &StatementTemplate) -> Result<(), SessionError> {
    let layout = &template.layout;
    for column in template.projection.iter().chain(&template.filter).chain(&template.condition) {
        if layout.column(column).is_none() {
            return Err(SessionError::Prepare(format!("unknown column {column}")));
        }
    }
    let key_names: Vec<&ColumnName> = layout.primary_key.iter().map(|spec| &spec.name).collect();
    let filter_names: Vec<&ColumnName> = template.filter.iter().collect();
    if !key_names.starts_with(&filter_names) {
        return Err(SessionError::Unsupported(format!(
            "{} filter must be a primary key prefix",
            template.kind
        )));
    }
    let full_key = filter_names.len() == key_names.len();
    match template.kind {
        StatementKind::Insert => {
            if template.projection.len() != layout.columns().count() {
                return Err(SessionError::Unsupported(
                    "insert must write every column".to_string(),
                ));
            }
        }
        StatementKind::SelectByKey | StatementKind::DeleteByKey if !full_key => {
            return Err(SessionError::Unsupported(format!(
                "{} requires the full primary key",
                template.kind
            )));
        }
        StatementKind::ConditionalDelete => {
            let condition_is_regular = template
                .condition
                .as_ref()
                .is_some_and(|column| layout.regular.iter().any(|spec| &spec.name == column));
            if !full_key || !condition_is_regular {
                return Err(SessionError::Unsupported(
                    "conditional delete requires the full primary key and a regular column condition"
                        .to_string(),
                ));
            }
        }
        StatementKind::SelectByKey | StatementKind::DeleteByKey | StatementKind::SelectKeyAndId => {
        }
    }
    Ok(())
}

/// Returns the value bound to a column.
fn bound_value<'a>(
    statement: &'a BoundStatement,
    column: &ColumnName,
) -> Result<&'a CqlValue, SessionError> {
    statement
        .value_for(column)
        .ok_or_else(|| SessionError::Execution(format!("no value bound for {column}")))
}

/// Builds an output row with the projected columns.
fn project(
    layout: &TableLayout,
    projection: &[ColumnName],
    key: &[CqlValue],
    stored: &StoredRow,
) -> Row {
    let mut row = Row::new();
    for column in projection {
        let value = layout
            .primary_key
            .iter()
            .position(|spec| &spec.name == column)
            .and_then(|index| key.get(index))
            .or_else(|| stored.values.get(column.as_str()));
        if let Some(value) = value {
            row.insert(column.as_str(), value.clone());
        }
    }
    row
}
