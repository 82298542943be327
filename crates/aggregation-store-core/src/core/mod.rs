// crates/aggregation-store-core/src/core/mod.rs
// ============================================================================
// Module: Aggregation Store Core Types
// Description: Identifiers, column model, key composition, and statements.
// Purpose: Provide the stable value types every other module builds on.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Core types describe what is stored (aggregation keys, exchange ids, results)
//! and where it is stored (table, fixed prefix, column names). Statement
//! templates are plain data derived from these types and rendered to CQL.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod exchange;
pub mod identifiers;
pub mod key;
pub mod schema;
pub mod statement;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use exchange::AggregateResult;
pub use exchange::Exchange;
pub use exchange::ResultIdentity;
pub use identifiers::AggregationKey;
pub use identifiers::ExchangeId;
pub use key::KeyComposer;
pub use schema::ColumnKind;
pub use schema::ColumnName;
pub use schema::ConsistencyLevel;
pub use schema::CqlValue;
pub use schema::FixedPrefix;
pub use schema::MAX_IDENTIFIER_LENGTH;
pub use schema::PrefixColumn;
pub use schema::RepositorySettings;
pub use schema::SettingsError;
pub use schema::TableName;
pub use statement::APPLIED_COLUMN;
pub use statement::ColumnSpec;
pub use statement::StatementKind;
pub use statement::StatementTemplate;
pub use statement::TableLayout;
