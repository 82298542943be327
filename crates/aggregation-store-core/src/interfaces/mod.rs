// crates/aggregation-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Aggregation Store Interfaces
// Description: Backend-agnostic session, row, and codec contracts.
// Purpose: Define the seams between the repository, storage, and payloads.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! The repository never talks to a storage engine directly. It prepares
//! [`StatementTemplate`] values through a [`Session`], binds composed key
//! values into [`BoundStatement`]s, and reads typed columns back from
//! [`Row`]s. Payload bytes go through a [`ResultCodec`].
//!
//! Sessions must be safe for concurrent use and must apply conditional
//! deletes atomically per row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::AggregateResult;
use crate::core::AggregationKey;
use crate::core::APPLIED_COLUMN;
use crate::core::ColumnName;
use crate::core::CqlValue;
use crate::core::StatementKind;
use crate::core::StatementTemplate;
use crate::core::TableName;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by a storage session.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Session could not be established or has been lost.
    #[error("session connection error: {0}")]
    Connection(String),
    /// Statement could not be prepared.
    #[error("session prepare error: {0}")]
    Prepare(String),
    /// Statement execution failed.
    #[error("session execution error: {0}")]
    Execution(String),
    /// The backend does not support the requested statement shape.
    #[error("session unsupported: {0}")]
    Unsupported(String),
    /// The session has been closed.
    #[error("session closed")]
    Closed,
}

/// Errors raised when reading typed columns from a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// Column not present in the row.
    #[error("missing column: {0}")]
    MissingColumn(String),
    /// Column present with a different type.
    #[error("column type mismatch: {column} is not {expected}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Requested type label.
        expected: &'static str,
    },
}

impl From<RowError> for SessionError {
    fn from(error: RowError) -> Self {
        Self::Execution(error.to_string())
    }
}

/// Errors raised by a result codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Result could not be serialized.
    #[error("codec encode error: {0}")]
    Encode(String),
    /// Stored bytes could not be deserialized.
    #[error("codec decode error: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// A statement prepared by a session.
///
/// # Invariants
/// - `template` is the exact template passed to [`Session::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    /// Template this statement was prepared from.
    template: Arc<StatementTemplate>,
    /// Backend-native statement text.
    native: String,
}

impl PreparedStatement {
    /// Wraps a template with the backend's native text.
    #[must_use]
    pub fn new(template: StatementTemplate, native: impl Into<String>) -> Self {
        Self {
            template: Arc::new(template),
            native: native.into(),
        }
    }

    /// Returns the template.
    #[must_use]
    pub fn template(&self) -> &StatementTemplate {
        &self.template
    }

    /// Returns the backend-native statement text.
    #[must_use]
    pub fn native(&self) -> &str {
        &self.native
    }

    /// Returns the statement kind.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.template.kind
    }

    /// Binds positional values.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Execution`] when the value count or a value
    /// type does not match the statement's parameter columns.
    pub fn bind(&self, values: Vec<CqlValue>) -> Result<BoundStatement, SessionError> {
        let columns = self.template.parameter_columns();
        if columns.len() != values.len() {
            return Err(SessionError::Execution(format!(
                "{} expects {} values, got {}",
                self.template.kind,
                columns.len(),
                values.len()
            )));
        }
        for (column, value) in columns.iter().zip(&values) {
            let spec = self.template.layout.column(column).ok_or_else(|| {
                SessionError::Execution(format!("unknown column {column}"))
            })?;
            if spec.kind != value.kind() {
                return Err(SessionError::Execution(format!(
                    "column {column} expects {}, got {}",
                    spec.kind,
                    value.kind()
                )));
            }
        }
        Ok(BoundStatement {
            statement: self.clone(),
            values,
        })
    }
}

/// A prepared statement with values bound in parameter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStatement {
    /// Statement being executed.
    statement: PreparedStatement,
    /// Bound values.
    values: Vec<CqlValue>,
}

impl BoundStatement {
    /// Returns the prepared statement.
    #[must_use]
    pub const fn statement(&self) -> &PreparedStatement {
        &self.statement
    }

    /// Returns the template.
    #[must_use]
    pub fn template(&self) -> &StatementTemplate {
        self.statement.template()
    }

    /// Returns the bound values.
    #[must_use]
    pub fn values(&self) -> &[CqlValue] {
        &self.values
    }

    /// Returns the value bound to a column.
    #[must_use]
    pub fn value_for(&self, column: &ColumnName) -> Option<&CqlValue> {
        self.template()
            .parameter_columns()
            .iter()
            .position(|candidate| *candidate == column)
            .and_then(|index| self.values.get(index))
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// One returned row with columns addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    /// Column values.
    columns: BTreeMap<String, CqlValue>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: CqlValue) {
        self.columns.insert(column.into(), value);
    }

    /// Returns the row with a column value set.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>, value: CqlValue) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns a raw column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&CqlValue> {
        self.columns.get(column)
    }

    /// Reads a text column.
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] when the column is missing or not text.
    pub fn get_string(&self, column: &str) -> Result<&str, RowError> {
        match self.require(column)? {
            CqlValue::Text(value) => Ok(value),
            CqlValue::Blob(_) | CqlValue::Boolean(_) => Err(mismatch(column, "text")),
        }
    }

    /// Reads a byte-sequence column.
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] when the column is missing or not a blob.
    pub fn get_bytes(&self, column: &str) -> Result<&[u8], RowError> {
        match self.require(column)? {
            CqlValue::Blob(value) => Ok(value),
            CqlValue::Text(_) | CqlValue::Boolean(_) => Err(mismatch(column, "blob")),
        }
    }

    /// Reads a boolean column.
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] when the column is missing or not boolean.
    pub fn get_bool(&self, column: &str) -> Result<bool, RowError> {
        match self.require(column)? {
            CqlValue::Boolean(value) => Ok(*value),
            CqlValue::Text(_) | CqlValue::Blob(_) => Err(mismatch(column, "boolean")),
        }
    }

    /// Returns a column value or a missing-column error.
    fn require(&self, column: &str) -> Result<&CqlValue, RowError> {
        self.columns.get(column).ok_or_else(|| RowError::MissingColumn(column.to_string()))
    }
}

/// Builds a type mismatch error.
fn mismatch(column: &str, expected: &'static str) -> RowError {
    RowError::TypeMismatch {
        column: column.to_string(),
        expected,
    }
}

/// Rows returned by a statement execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    /// Returned rows in backend order.
    rows: Vec<Row>,
}

impl ResultSet {
    /// Returns an acknowledgement with no rows.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rows: Vec::new(),
        }
    }

    /// Wraps returned rows.
    #[must_use]
    pub const fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
        }
    }

    /// Returns the single-row outcome of a conditional statement.
    #[must_use]
    pub fn applied_flag(applied: bool) -> Self {
        Self::from_rows(vec![Row::new().with_column(APPLIED_COLUMN, CqlValue::Boolean(applied))])
    }

    /// Returns all rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the first row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Reads the `[applied]` flag of a conditional statement.
    ///
    /// Returns `Ok(None)` when the result carries no rows.
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] when the first row lacks a boolean `[applied]` column.
    pub fn applied(&self) -> Result<Option<bool>, RowError> {
        self.rows.first().map(|row| row.get_bool(APPLIED_COLUMN)).transpose()
    }
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Connection to the backing replicated store.
///
/// # Invariants
/// - Implementations are safe for concurrent `prepare` and `execute`.
/// - Conditional deletes compare and delete atomically per row.
pub trait Session: Send + Sync {
    /// Prepares a statement template.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the template cannot be prepared.
    fn prepare(&self, template: &StatementTemplate) -> Result<PreparedStatement, SessionError>;

    /// Executes a bound statement at the template's consistency level.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when execution fails.
    fn execute(&self, statement: &BoundStatement) -> Result<ResultSet, SessionError>;

    /// Releases backend resources. Later calls fail with [`SessionError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when shutdown fails.
    fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Shared session handle.
pub type SharedSession = Arc<dyn Session>;

/// Factory for sessions owned by the repository that creates them.
pub trait SessionConnector: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot be established.
    fn connect(&self) -> Result<SharedSession, SessionError>;
}

// ============================================================================
// SECTION: Codecs
// ============================================================================

/// Context passed to codec calls.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext<'a> {
    /// Table the payload belongs to.
    pub table: &'a TableName,
    /// Aggregation key of the row.
    pub aggregation_key: &'a AggregationKey,
}

/// Marshals aggregated results to and from payload bytes.
pub trait ResultCodec: Send + Sync {
    /// Result type stored by the repository.
    type Value: AggregateResult;

    /// Serializes a result.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] when the value cannot be serialized.
    fn marshal(&self, context: &CodecContext<'_>, value: &Self::Value) -> Result<Vec<u8>, CodecError>;

    /// Deserializes a result.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the bytes are corrupt or unrecognized.
    fn unmarshal(&self, context: &CodecContext<'_>, bytes: &[u8]) -> Result<Self::Value, CodecError>;
}
