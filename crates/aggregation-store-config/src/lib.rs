// crates/aggregation-store-config/src/lib.rs
// ============================================================================
// Module: Aggregation Store Config Library
// Description: Canonical config model, validation, and repository assembly.
// Purpose: Single source of truth for aggregation-store.toml semantics.
// Dependencies: aggregation-store-core, aggregation-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `aggregation-store-config` defines the configuration model for an
//! aggregation repository: table and column names, the fixed prefix, TTL,
//! consistency levels, the session backend, and the audit sink. Validation
//! fails closed, and session backends are resolved through an explicit
//! registry so unknown backends and options are rejected before any
//! connection is attempted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod builder;
pub mod config;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builder::build_repository;
pub use builder::build_repository_with;
pub use config::*;
pub use registry::BackendOption;
pub use registry::ConnectorFactory;
pub use registry::OptionKind;
pub use registry::SessionBackend;
pub use registry::SessionBackendRegistry;
