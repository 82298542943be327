// crates/aggregation-store-core/src/core/exchange.rs
// ============================================================================
// Module: Aggregation Store Results
// Description: Aggregated result contract and a default exchange value.
// Purpose: Tie every stored payload to the exchange id that confirms it.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The repository stores opaque results. The only thing it needs to know
//! about a result is the exchange id that a later confirmation will name.
//! [`Exchange`] is a serializable default result type with a JSON body plus
//! header and property maps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AggregationKey;
use crate::core::identifiers::ExchangeId;

// ============================================================================
// SECTION: Result Contract
// ============================================================================

/// A stored aggregation result.
pub trait AggregateResult {
    /// Returns the exchange id identifying this version of the result.
    fn exchange_id(&self) -> &ExchangeId;
}

// ============================================================================
// SECTION: Exchange
// ============================================================================

/// Default aggregated result: a JSON body with headers and properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Exchange id assigned by the caller.
    pub exchange_id: ExchangeId,
    /// Accumulated body.
    pub body: Value,
    /// Message headers.
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    /// Exchange properties.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Exchange {
    /// Creates an exchange with an empty header and property set.
    #[must_use]
    pub fn new(exchange_id: impl Into<ExchangeId>, body: Value) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            body,
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: Value) -> Self {
        self.headers.insert(name.into(), value);
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

impl AggregateResult for Exchange {
    fn exchange_id(&self) -> &ExchangeId {
        &self.exchange_id
    }
}

// ============================================================================
// SECTION: Result Identity
// ============================================================================

/// The `(aggregation key, exchange id)` pair naming one stored version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultIdentity {
    /// Aggregation key of the row.
    pub aggregation_key: AggregationKey,
    /// Exchange id currently stored in the row.
    pub exchange_id: ExchangeId,
}
