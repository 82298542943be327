// crates/aggregation-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Aggregation Session
// Description: Durable Session backend for the aggregation repository.
// Purpose: Keep in-flight aggregation groups on local disk across restarts.
// Dependencies: aggregation-store-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`Session`](aggregation_store_core::Session)
//! for single-node deployments. Rows are stored one per aggregation key with
//! an optional expiry timestamp, and the conditional delete used by confirm
//! is a single predicated `DELETE`. Security posture: the database file is
//! untrusted input; rows whose columns do not match the prepared layout are
//! reported as execution errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use session::EXPIRY_COLUMN;
pub use session::SqliteConnector;
pub use session::SqliteJournalMode;
pub use session::SqliteSession;
pub use session::SqliteSessionConfig;
pub use session::SqliteSessionError;
pub use session::SqliteSyncMode;
