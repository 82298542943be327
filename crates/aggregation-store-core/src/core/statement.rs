// crates/aggregation-store-core/src/core/statement.rs
// ============================================================================
// Module: Aggregation Store Statement Templates
// Description: Structured statement descriptions with CQL rendering.
// Purpose: Describe each repository statement once, for any backend to prepare.
// Dependencies: serde, crate::core::schema
// ============================================================================

//! ## Overview
//! A [`StatementTemplate`] is plain data: the statement kind, the table
//! layout, which columns are projected or filtered, an optional compare
//! column, the insert time-to-live, and the consistency level. CQL backends
//! prepare the rendered text from [`StatementTemplate::cql`]; other backends
//! translate the structure directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::schema::ColumnKind;
use crate::core::schema::ColumnName;
use crate::core::schema::ConsistencyLevel;
use crate::core::schema::TableName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Column carrying the outcome of a conditional statement.
pub const APPLIED_COLUMN: &str = "[applied]";

// ============================================================================
// SECTION: Statement Kind
// ============================================================================

/// The five statements a repository prepares at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Upsert of every column for a composed key.
    Insert,
    /// Point read of every column for a composed key.
    SelectByKey,
    /// Unconditional delete of a composed key.
    DeleteByKey,
    /// Key and exchange id projection filtered by the fixed prefix.
    SelectKeyAndId,
    /// Delete of a composed key only while its exchange id still matches.
    ConditionalDelete,
}

impl StatementKind {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::SelectByKey => "select_by_key",
            Self::DeleteByKey => "delete_by_key",
            Self::SelectKeyAndId => "select_key_and_id",
            Self::ConditionalDelete => "conditional_delete",
        }
    }

    /// Returns true for statements that only read.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::SelectByKey | Self::SelectKeyAndId)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Table Layout
// ============================================================================

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: ColumnName,
    /// Column value type.
    pub kind: ColumnKind,
}

impl ColumnSpec {
    /// Creates a column spec.
    #[must_use]
    pub const fn new(name: ColumnName, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
        }
    }
}

/// Physical table layout shared by every statement of a repository.
///
/// # Invariants
/// - `primary_key` lists prefix columns then the aggregation key column.
/// - Column names are unique across `primary_key` and `regular`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    /// Table identifier.
    pub table: TableName,
    /// Primary-key columns in order.
    pub primary_key: Vec<ColumnSpec>,
    /// Non-key columns.
    pub regular: Vec<ColumnSpec>,
}

impl TableLayout {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &ColumnName) -> Option<&ColumnSpec> {
        self.primary_key.iter().chain(&self.regular).find(|spec| &spec.name == name)
    }

    /// Returns every column, primary key first.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.primary_key.iter().chain(&self.regular)
    }
}

// ============================================================================
// SECTION: Statement Template
// ============================================================================

/// Backend-neutral description of one prepared statement.
///
/// # Invariants
/// - `filter` is a prefix of the layout's primary key.
/// - `ttl_seconds` is only set on inserts.
/// - `condition` is only set on conditional deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    /// Statement kind.
    pub kind: StatementKind,
    /// Shared table layout.
    pub layout: Arc<TableLayout>,
    /// Written columns for inserts, returned columns for selects.
    pub projection: Vec<ColumnName>,
    /// Equality filter columns, bound in order.
    pub filter: Vec<ColumnName>,
    /// Compare column for conditional deletes.
    pub condition: Option<ColumnName>,
    /// Insert time-to-live.
    pub ttl_seconds: Option<u32>,
    /// Consistency level requested for execution.
    pub consistency: ConsistencyLevel,
}

impl StatementTemplate {
    /// Returns the columns whose values are bound, in binding order.
    #[must_use]
    pub fn parameter_columns(&self) -> Vec<&ColumnName> {
        match self.kind {
            StatementKind::Insert => self.projection.iter().collect(),
            StatementKind::SelectByKey
            | StatementKind::DeleteByKey
            | StatementKind::SelectKeyAndId
            | StatementKind::ConditionalDelete => {
                self.filter.iter().chain(self.condition.as_ref()).collect()
            }
        }
    }

    /// Renders the statement as CQL text with positional markers.
    #[must_use]
    pub fn cql(&self) -> String {
        let table = &self.layout.table;
        let mut cql = match self.kind {
            StatementKind::Insert => {
                let columns = join_columns(&self.projection, ",");
                let markers = vec!["?"; self.projection.len()].join(",");
                let mut insert = format!("INSERT INTO {table}({columns}) VALUES ({markers})");
                if let Some(ttl) = self.ttl_seconds {
                    insert.push_str(&format!(" USING TTL {ttl}"));
                }
                return insert;
            }
            StatementKind::SelectByKey | StatementKind::SelectKeyAndId => {
                format!("SELECT {} FROM {table}", join_columns(&self.projection, ","))
            }
            StatementKind::DeleteByKey | StatementKind::ConditionalDelete => {
                format!("DELETE FROM {table}")
            }
        };
        if !self.filter.is_empty() {
            let predicates: Vec<String> =
                self.filter.iter().map(|column| format!("{column}=?")).collect();
            cql.push_str(" WHERE ");
            cql.push_str(&predicates.join(" AND "));
        }
        if let Some(condition) = &self.condition {
            cql.push_str(&format!(" IF {condition}=?"));
        }
        cql
    }
}

/// Joins column names with a separator.
fn join_columns(columns: &[ColumnName], separator: &str) -> String {
    columns.iter().map(ColumnName::as_str).collect::<Vec<_>>().join(separator)
}
