// crates/aggregation-store-core/src/lib.rs
// ============================================================================
// Module: Aggregation Store Core Library
// Description: Public API surface for the aggregation store core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Aggregation store core buffers the latest accumulated result for each
//! in-flight aggregation group in a replicated backing store and removes a
//! group's row only after a confirmation tied to the exact result version.
//! Confirmation resolves the exchange id to its aggregation key with a prefix
//! scan and then issues a compare-and-delete, so a newer write that lands in
//! between is never removed.
//!
//! The core is backend-agnostic: it talks to storage through the [`Session`]
//! interface and to payloads through the [`ResultCodec`] interface.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::AuditOutcome;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RepositoryAuditEvent;
pub use audit::RepositoryAuditEventParams;
pub use audit::RepositoryAuditSink;
pub use audit::RepositoryOperation;
pub use audit::StatementAuditEvent;
pub use audit::StderrAuditSink;
pub use interfaces::BoundStatement;
pub use interfaces::CodecContext;
pub use interfaces::CodecError;
pub use interfaces::PreparedStatement;
pub use interfaces::ResultCodec;
pub use interfaces::ResultSet;
pub use interfaces::Row;
pub use interfaces::RowError;
pub use interfaces::Session;
pub use interfaces::SessionConnector;
pub use interfaces::SessionError;
pub use interfaces::SharedSession;
pub use runtime::AggregationRepository;
pub use runtime::ConfirmOutcome;
pub use runtime::InMemoryConnector;
pub use runtime::InMemorySession;
pub use runtime::JsonCodec;
pub use runtime::RepositoryError;
pub use runtime::RunningRepository;
pub use runtime::SessionSource;
pub use runtime::StatementError;
pub use runtime::StatementSet;
pub use runtime::StatementTemplates;
