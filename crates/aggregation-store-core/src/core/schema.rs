// crates/aggregation-store-core/src/core/schema.rs
// ============================================================================
// Module: Aggregation Store Column Model
// Description: Table and column identifiers, row values, and repository settings.
// Purpose: Describe the storage row layout with validated, injection-free names.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A storage row is keyed by the fixed prefix values followed by the
//! aggregation key, and carries an exchange id column and a payload column.
//! Identifiers are validated once at construction so statement rendering
//! never has to quote or escape them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a table, keyspace, or column identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 48;
/// Maximum time-to-live accepted for inserts (twenty years, in seconds).
pub const MAX_TTL_SECONDS: u32 = 630_720_000;
/// Default aggregation key column name.
const DEFAULT_KEY_COLUMN: &str = "aggregation_key";
/// Default exchange id column name.
const DEFAULT_EXCHANGE_ID_COLUMN: &str = "exchange_id";
/// Default payload column name.
const DEFAULT_PAYLOAD_COLUMN: &str = "exchange";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while validating repository settings.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Identifier is empty, too long, or contains unsupported characters.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// Column name used more than once in the row layout.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// Time-to-live outside the accepted range.
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
}

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Validated column identifier.
///
/// # Invariants
/// - Matches `[A-Za-z_][A-Za-z0-9_]*` and is at most [`MAX_IDENTIFIER_LENGTH`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName(String);

impl ColumnName {
    /// Creates a validated column name.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidIdentifier`] when the name is not a plain identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, SettingsError> {
        let name = name.into();
        validate_identifier("column", &name)?;
        Ok(Self(name))
    }

    /// Builds a column name from a constant known to be valid.
    fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    /// Returns the column name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated table identifier with an optional keyspace qualifier.
///
/// # Invariants
/// - Either `table` or `keyspace.table`; each part is a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    /// Optional keyspace qualifier.
    keyspace: Option<String>,
    /// Unqualified table name.
    name: String,
}

impl TableName {
    /// Parses and validates a table name.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidIdentifier`] when any part is invalid or
    /// more than one qualifier is present.
    pub fn new(value: &str) -> Result<Self, SettingsError> {
        let mut parts = value.split('.');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(SettingsError::InvalidIdentifier(format!(
                "table name has more than one qualifier: {value}"
            )));
        }
        match second {
            Some(name) => {
                validate_identifier("keyspace", first)?;
                validate_identifier("table", name)?;
                Ok(Self {
                    keyspace: Some(first.to_string()),
                    name: name.to_string(),
                })
            }
            None => {
                validate_identifier("table", first)?;
                Ok(Self {
                    keyspace: None,
                    name: first.to_string(),
                })
            }
        }
    }

    /// Returns the keyspace qualifier, if any.
    #[must_use]
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Returns the unqualified table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.keyspace {
            Some(keyspace) => write!(f, "{keyspace}.{}", self.name),
            None => self.name.fmt(f),
        }
    }
}

/// Validates a plain identifier.
fn validate_identifier(label: &str, value: &str) -> Result<(), SettingsError> {
    if value.is_empty() {
        return Err(SettingsError::InvalidIdentifier(format!("{label} name must be non-empty")));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SettingsError::InvalidIdentifier(format!(
            "{label} name exceeds {MAX_IDENTIFIER_LENGTH} bytes: {value}"
        )));
    }
    let mut chars = value.chars();
    let leading_ok = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if !leading_ok || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(SettingsError::InvalidIdentifier(format!(
            "{label} name must match [A-Za-z_][A-Za-z0-9_]*: {value}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// Column value types supported by the backing store contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// UTF-8 text.
    Text,
    /// Opaque byte sequence.
    Blob,
    /// Boolean flag.
    Boolean,
}

impl ColumnKind {
    /// Returns a stable label for the column kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single bound or returned column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CqlValue {
    /// UTF-8 text value.
    Text(String),
    /// Byte sequence value.
    Blob(Vec<u8>),
    /// Boolean value.
    Boolean(bool),
}

impl CqlValue {
    /// Returns the column kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        match self {
            Self::Text(_) => ColumnKind::Text,
            Self::Blob(_) => ColumnKind::Blob,
            Self::Boolean(_) => ColumnKind::Boolean,
        }
    }
}

impl From<&str> for CqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CqlValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

// ============================================================================
// SECTION: Fixed Prefix
// ============================================================================

/// One `(column, value)` pair of the fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixColumn {
    /// Prefix column name.
    pub column: ColumnName,
    /// Constant value stored in the column for this repository instance.
    pub value: CqlValue,
}

impl PrefixColumn {
    /// Creates a prefix column pair.
    #[must_use]
    pub fn new(column: ColumnName, value: impl Into<CqlValue>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// Ordered fixed primary-key prefix shared by every row of one repository.
///
/// # Invariants
/// - Column names are unique.
/// - Values never change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedPrefix {
    /// Ordered prefix columns.
    columns: Vec<PrefixColumn>,
}

impl FixedPrefix {
    /// Creates a fixed prefix from ordered column pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::DuplicateColumn`] when a column repeats.
    pub fn new(columns: Vec<PrefixColumn>) -> Result<Self, SettingsError> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.column.as_str()) {
                return Err(SettingsError::DuplicateColumn(format!(
                    "fixed prefix column repeated: {}",
                    column.column
                )));
            }
        }
        Ok(Self {
            columns,
        })
    }

    /// Returns an empty prefix (the aggregation key is the whole primary key).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Returns the prefix column pairs in order.
    #[must_use]
    pub fn columns(&self) -> &[PrefixColumn] {
        &self.columns
    }

    /// Returns the number of prefix columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when the prefix has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// SECTION: Consistency
// ============================================================================

/// Replica acknowledgement level requested for a statement.
///
/// Variants are declared in ascending strength; datacenter-local levels sort
/// after the fixed replica counts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    /// Any node, including hinted handoff.
    Any,
    /// One replica.
    One,
    /// Two replicas.
    Two,
    /// Three replicas.
    Three,
    /// One replica in the local datacenter.
    #[default]
    LocalOne,
    /// Quorum of replicas in the local datacenter.
    LocalQuorum,
    /// Quorum of all replicas.
    Quorum,
    /// Quorum in every datacenter.
    EachQuorum,
    /// All replicas.
    All,
}

impl ConsistencyLevel {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::One => "one",
            Self::Two => "two",
            Self::Three => "three",
            Self::LocalOne => "local_one",
            Self::LocalQuorum => "local_quorum",
            Self::Quorum => "quorum",
            Self::EachQuorum => "each_quorum",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Repository Settings
// ============================================================================

/// Table and column configuration consumed when building statements.
///
/// # Invariants
/// - Key, exchange id, and payload columns are distinct from each other and
///   from every fixed prefix column.
/// - `ttl_seconds`, when set, is in `1..=MAX_TTL_SECONDS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    /// Backing table.
    pub table: TableName,
    /// Fixed primary-key prefix for this repository instance.
    pub fixed_prefix: FixedPrefix,
    /// Aggregation key column (last primary-key column).
    pub key_column: ColumnName,
    /// Exchange id column.
    pub exchange_id_column: ColumnName,
    /// Marshalled payload column.
    pub payload_column: ColumnName,
    /// Optional time-to-live applied on insert.
    pub ttl_seconds: Option<u32>,
    /// Consistency for point reads and prefix scans.
    pub read_consistency: ConsistencyLevel,
    /// Consistency for inserts and deletes.
    pub write_consistency: ConsistencyLevel,
}

impl RepositorySettings {
    /// Creates settings for a table with default column names and no prefix.
    #[must_use]
    pub fn new(table: TableName) -> Self {
        Self {
            table,
            fixed_prefix: FixedPrefix::empty(),
            key_column: ColumnName::from_static(DEFAULT_KEY_COLUMN),
            exchange_id_column: ColumnName::from_static(DEFAULT_EXCHANGE_ID_COLUMN),
            payload_column: ColumnName::from_static(DEFAULT_PAYLOAD_COLUMN),
            ttl_seconds: None,
            read_consistency: ConsistencyLevel::default(),
            write_consistency: ConsistencyLevel::default(),
        }
    }

    /// Replaces the fixed prefix.
    #[must_use]
    pub fn with_fixed_prefix(mut self, fixed_prefix: FixedPrefix) -> Self {
        self.fixed_prefix = fixed_prefix;
        self
    }

    /// Sets the insert time-to-live in seconds.
    #[must_use]
    pub const fn with_ttl_seconds(mut self, ttl_seconds: u32) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    /// Validates cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when columns collide or the TTL is out of range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut seen: BTreeSet<&str> =
            self.fixed_prefix.columns().iter().map(|column| column.column.as_str()).collect();
        for column in [&self.key_column, &self.exchange_id_column, &self.payload_column] {
            if !seen.insert(column.as_str()) {
                return Err(SettingsError::DuplicateColumn(format!(
                    "column used more than once: {column}"
                )));
            }
        }
        if let Some(ttl) = self.ttl_seconds
            && (ttl == 0 || ttl > MAX_TTL_SECONDS)
        {
            return Err(SettingsError::InvalidTtl(format!(
                "ttl_seconds must be in 1..={MAX_TTL_SECONDS}, got {ttl}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn identifier_rules_reject_injection() {
        assert!(ColumnName::new("exchange_id").is_ok());
        assert!(ColumnName::new("_hidden").is_ok());
        assert!(ColumnName::new("").is_err());
        assert!(ColumnName::new("1abc").is_err());
        assert!(ColumnName::new("a;DROP").is_err());
        assert!(ColumnName::new("a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn table_name_accepts_single_qualifier() {
        let table = TableName::new("camel.aggregation").unwrap();
        assert_eq!(table.keyspace(), Some("camel"));
        assert_eq!(table.name(), "aggregation");
        assert_eq!(table.to_string(), "camel.aggregation");
        assert!(TableName::new("a.b.c").is_err());
        assert!(TableName::new(".b").is_err());
    }

    #[test]
    fn consistency_levels_are_ordered_by_strength() {
        assert!(ConsistencyLevel::One < ConsistencyLevel::Quorum);
        assert!(ConsistencyLevel::Quorum < ConsistencyLevel::All);
        assert!(ConsistencyLevel::LocalOne < ConsistencyLevel::LocalQuorum);
    }
}
