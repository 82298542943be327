// crates/aggregation-store-core/src/runtime/codec.rs
// ============================================================================
// Module: Aggregation Store JSON Codec
// Description: serde_json result codec with a tagged envelope.
// Purpose: Marshal serializable results and reject foreign payloads.
// Dependencies: serde, serde_json, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`JsonCodec`] wraps each result in an envelope carrying a format label so
//! that bytes written by another codec decode to an error instead of a
//! misread value. Payloads above the configured size limit are refused in
//! both directions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::marker::PhantomData;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::AggregateResult;
use crate::interfaces::CodecContext;
use crate::interfaces::CodecError;
use crate::interfaces::ResultCodec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Envelope format label.
const JSON_FORMAT: &str = "aggregation-json/1";
/// Default payload size limit (bytes).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Borrowed envelope used when encoding.
#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    /// Format label.
    format: &'a str,
    /// Wrapped result.
    value: &'a T,
}

/// Owned envelope used when decoding.
#[derive(Deserialize)]
struct Envelope<T> {
    /// Format label.
    format: String,
    /// Wrapped result.
    value: T,
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// JSON result codec.
pub struct JsonCodec<T> {
    /// Maximum payload size in bytes.
    max_payload_bytes: usize,
    /// Result type marker.
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Creates a codec with the default size limit.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Creates a codec with an explicit size limit.
    #[must_use]
    pub const fn with_limit(max_payload_bytes: usize) -> Self {
        Self {
            max_payload_bytes,
            _marker: PhantomData,
        }
    }

    /// Returns the payload size limit.
    #[must_use]
    pub const fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::with_limit(self.max_payload_bytes)
    }
}

impl<T> ResultCodec for JsonCodec<T>
where
    T: AggregateResult + Serialize + DeserializeOwned,
{
    type Value = T;

    fn marshal(&self, context: &CodecContext<'_>, value: &T) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_json::to_vec(&EnvelopeRef {
            format: JSON_FORMAT,
            value,
        })
        .map_err(|err| CodecError::Encode(format!("{}: {err}", context.aggregation_key)))?;
        if bytes.len() > self.max_payload_bytes {
            return Err(CodecError::Encode(format!(
                "{}: payload exceeds size limit: {} bytes (max {})",
                context.aggregation_key,
                bytes.len(),
                self.max_payload_bytes
            )));
        }
        Ok(bytes)
    }

    fn unmarshal(&self, context: &CodecContext<'_>, bytes: &[u8]) -> Result<T, CodecError> {
        if bytes.len() > self.max_payload_bytes {
            return Err(CodecError::Decode(format!(
                "{}: payload exceeds size limit: {} bytes (max {})",
                context.aggregation_key,
                bytes.len(),
                self.max_payload_bytes
            )));
        }
        let envelope: Envelope<T> = serde_json::from_slice(bytes)
            .map_err(|err| CodecError::Decode(format!("{}: {err}", context.aggregation_key)))?;
        if envelope.format != JSON_FORMAT {
            return Err(CodecError::Decode(format!(
                "{}: unsupported payload format {}",
                context.aggregation_key, envelope.format
            )));
        }
        Ok(envelope.value)
    }
}
