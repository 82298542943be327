// crates/aggregation-store-core/src/core/identifiers.rs
// ============================================================================
// Module: Aggregation Store Identifiers
// Description: Opaque identifiers for aggregation groups and stored results.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Aggregation keys name an in-progress group; exchange ids name one specific
//! version of that group's result. Both are caller-assigned and opaque, so no
//! validation happens here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of one in-progress aggregation group.
///
/// # Invariants
/// - Unique within the fixed prefix of the owning repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregationKey(String);

impl AggregationKey {
    /// Creates a new aggregation key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AggregationKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AggregationKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of one specific version of a group's result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Creates a new exchange identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ExchangeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ExchangeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
