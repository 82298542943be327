// crates/aggregation-store-core/src/runtime/mod.rs
// ============================================================================
// Module: Aggregation Store Runtime
// Description: Statement set, repository lifecycle, and bundled backends.
// Purpose: Execute the add/get/confirm/remove/get_keys protocol over a session.
// Dependencies: crate::{audit, core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! Runtime modules compile the statement set, run the repository protocol,
//! and provide an in-memory session plus a JSON result codec for tests and
//! local use.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod codec;
pub mod memory;
pub mod repository;
pub mod statements;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use codec::JsonCodec;
pub use memory::InMemoryConnector;
pub use memory::InMemorySession;
pub use repository::AggregationRepository;
pub use repository::ConfirmOutcome;
pub use repository::RepositoryError;
pub use repository::RunningRepository;
pub use repository::SessionSource;
pub use statements::StatementError;
pub use statements::StatementSet;
pub use statements::StatementTemplates;
