// crates/aggregation-store-config/src/builder.rs
// ============================================================================
// Module: Repository Builder
// Description: Assemble a repository from validated configuration.
// Purpose: Wire settings, session backend, and audit sink in one place.
// Dependencies: aggregation-store-core
// ============================================================================

//! ## Overview
//! Builds an [`AggregationRepository`] that owns its session: the backend
//! connector runs at start and the session is closed at stop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aggregation_store_core::AggregationRepository;
use aggregation_store_core::ResultCodec;
use aggregation_store_core::SessionSource;

use crate::config::AggregationStoreConfig;
use crate::config::ConfigError;
use crate::registry::SessionBackendRegistry;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a repository using the built-in session backends.
///
/// # Errors
///
/// Returns [`ConfigError`] when validation fails or the audit sink cannot be opened.
pub fn build_repository<C: ResultCodec>(
    config: &AggregationStoreConfig,
    codec: C,
) -> Result<AggregationRepository<C>, ConfigError> {
    build_repository_with(config, codec, &SessionBackendRegistry::with_builtins())
}

/// Builds a repository resolving the session backend through `registry`.
///
/// # Errors
///
/// Returns [`ConfigError`] when validation fails or the audit sink cannot be opened.
pub fn build_repository_with<C: ResultCodec>(
    config: &AggregationStoreConfig,
    codec: C,
    registry: &SessionBackendRegistry,
) -> Result<AggregationRepository<C>, ConfigError> {
    config.validate_with(registry)?;
    let settings = config.repository_settings()?;
    let connector = registry.build_connector(&config.session)?;
    let audit = config.audit.build_sink()?;
    let repository = AggregationRepository::new(settings, codec, SessionSource::Owned(connector))
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(repository.with_audit_sink(audit))
}
