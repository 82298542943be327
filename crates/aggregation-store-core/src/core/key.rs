// crates/aggregation-store-core/src/core/key.rs
// ============================================================================
// Module: Aggregation Store Key Composer
// Description: Composite primary-key construction from prefix and group key.
// Purpose: Keep every statement and row lookup on the same column ordering.
// Dependencies: crate::core::{identifiers, schema, statement}
// ============================================================================

//! ## Overview
//! The composite primary key of a storage row is the fixed prefix values
//! followed by the aggregation key, with the key column last. The composer
//! owns that ordering and the full column list every statement is built from.
//!
//! Security posture: scanned rows are checked against this instance's prefix
//! before their keys are trusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::AggregationKey;
use crate::core::schema::ColumnKind;
use crate::core::schema::ColumnName;
use crate::core::schema::CqlValue;
use crate::core::schema::RepositorySettings;
use crate::core::schema::SettingsError;
use crate::core::schema::TableName;
use crate::core::statement::ColumnSpec;
use crate::core::statement::TableLayout;

// ============================================================================
// SECTION: Key Composer
// ============================================================================

/// Builds and decomposes composite storage keys.
///
/// # Invariants
/// - Prefix values are captured at construction and never change.
/// - Column order is prefix columns, key, exchange id, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComposer {
    /// Prefix column names in order.
    prefix_columns: Vec<ColumnName>,
    /// Prefix values in order.
    prefix_values: Vec<CqlValue>,
    /// Aggregation key column.
    key_column: ColumnName,
    /// Exchange id column.
    exchange_id_column: ColumnName,
    /// Payload column.
    payload_column: ColumnName,
}

impl KeyComposer {
    /// Creates a composer from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the settings fail validation.
    pub fn new(settings: &RepositorySettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let prefix = settings.fixed_prefix.columns();
        Ok(Self {
            prefix_columns: prefix.iter().map(|entry| entry.column.clone()).collect(),
            prefix_values: prefix.iter().map(|entry| entry.value.clone()).collect(),
            key_column: settings.key_column.clone(),
            exchange_id_column: settings.exchange_id_column.clone(),
            payload_column: settings.payload_column.clone(),
        })
    }

    /// Returns the full primary key for a group: prefix values then the key.
    #[must_use]
    pub fn compose_key(&self, key: &AggregationKey) -> Vec<CqlValue> {
        let mut values = self.prefix_values.clone();
        values.push(CqlValue::Text(key.as_str().to_string()));
        values
    }

    /// Recovers the aggregation key from a full primary key.
    ///
    /// Returns `None` when the arity is wrong, the prefix belongs to another
    /// instance, or the key value is not text.
    #[must_use]
    pub fn decompose_key(&self, values: &[CqlValue]) -> Option<AggregationKey> {
        let (last, prefix) = values.split_last()?;
        if prefix != self.prefix_values.as_slice() {
            return None;
        }
        match last {
            CqlValue::Text(key) => Some(AggregationKey::new(key.clone())),
            CqlValue::Blob(_) | CqlValue::Boolean(_) => None,
        }
    }

    /// Returns the fixed prefix values used to bind prefix scans.
    #[must_use]
    pub fn prefix_values(&self) -> &[CqlValue] {
        &self.prefix_values
    }

    /// Returns the prefix column names.
    #[must_use]
    pub fn prefix_columns(&self) -> &[ColumnName] {
        &self.prefix_columns
    }

    /// Returns the primary-key columns: prefix columns then the key column.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<ColumnName> {
        let mut columns = self.prefix_columns.clone();
        columns.push(self.key_column.clone());
        columns
    }

    /// Returns every stored column in statement order.
    #[must_use]
    pub fn all_columns(&self) -> Vec<ColumnName> {
        let mut columns = self.primary_key_columns();
        columns.push(self.exchange_id_column.clone());
        columns.push(self.payload_column.clone());
        columns
    }

    /// Returns the aggregation key column.
    #[must_use]
    pub const fn key_column(&self) -> &ColumnName {
        &self.key_column
    }

    /// Returns the exchange id column.
    #[must_use]
    pub const fn exchange_id_column(&self) -> &ColumnName {
        &self.exchange_id_column
    }

    /// Returns the payload column.
    #[must_use]
    pub const fn payload_column(&self) -> &ColumnName {
        &self.payload_column
    }

    /// Describes the physical table this composer writes into.
    #[must_use]
    pub fn layout(&self, table: &TableName) -> TableLayout {
        let mut primary_key: Vec<ColumnSpec> = self
            .prefix_columns
            .iter()
            .zip(&self.prefix_values)
            .map(|(name, value)| ColumnSpec::new(name.clone(), value.kind()))
            .collect();
        primary_key.push(ColumnSpec::new(self.key_column.clone(), ColumnKind::Text));
        TableLayout {
            table: table.clone(),
            primary_key,
            regular: vec![
                ColumnSpec::new(self.exchange_id_column.clone(), ColumnKind::Text),
                ColumnSpec::new(self.payload_column.clone(), ColumnKind::Blob),
            ],
        }
    }
}
