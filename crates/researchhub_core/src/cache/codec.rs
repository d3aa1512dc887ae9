//! Versioned cache payload codec.
//!
//! Wire shape: `{"v":1,"kind":"<payload kind>","data":<payload>}`.
//!
//! # Invariants
//! - Decoding rejects unknown envelope fields, other versions and other
//!   payload kinds.
//! - Decoded payloads pass their own validation before being returned.

use super::CacheError;
use crate::model::researcher::Researcher;
use crate::repo::graph_repo::{CollaborationPair, RankedResearcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current envelope version written by this binary.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// A value that can be stored in the cache.
pub trait CachePayload: Serialize + DeserializeOwned {
    /// Discriminates payloads sharing the same envelope.
    const KIND: &'static str;

    /// Schema checks beyond what deserialization enforces.
    fn validate_payload(&self) -> Result<(), String> {
        Ok(())
    }
}

impl CachePayload for Researcher {
    const KIND: &'static str = "researcher";

    fn validate_payload(&self) -> Result<(), String> {
        self.validate().map_err(|err| err.to_string())
    }
}

impl CachePayload for Vec<RankedResearcher> {
    const KIND: &'static str = "top_researchers";

    fn validate_payload(&self) -> Result<(), String> {
        if self.iter().any(|entry| entry.name.trim().is_empty()) {
            return Err("ranking entry with blank name".to_string());
        }
        Ok(())
    }
}

impl CachePayload for Vec<CollaborationPair> {
    const KIND: &'static str = "top_pairs";
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    v: u32,
    kind: &'a str,
    data: &'a T,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvelopeIn {
    v: u32,
    kind: String,
    data: serde_json::Value,
}

/// Serializes `value` into the versioned envelope.
pub fn encode<T: CachePayload>(key: &str, value: &T) -> Result<String, CacheError> {
    serde_json::to_string(&EnvelopeOut {
        v: CACHE_FORMAT_VERSION,
        kind: T::KIND,
        data: value,
    })
    .map_err(|err| malformed(key, format!("cannot encode payload: {err}")))
}

/// Parses and validates a cached value.
///
/// # Errors
/// - `CacheError::Malformed` for invalid JSON, unsupported version, kind
///   mismatch, payload shape errors or failed payload validation.
pub fn decode<T: CachePayload>(key: &str, raw: &str) -> Result<T, CacheError> {
    let envelope: EnvelopeIn = serde_json::from_str(raw)
        .map_err(|err| malformed(key, format!("invalid envelope: {err}")))?;
    if envelope.v != CACHE_FORMAT_VERSION {
        return Err(malformed(
            key,
            format!(
                "unsupported version {}; expected {CACHE_FORMAT_VERSION}",
                envelope.v
            ),
        ));
    }
    if envelope.kind != T::KIND {
        return Err(malformed(
            key,
            format!("kind `{}` does not match `{}`", envelope.kind, T::KIND),
        ));
    }

    let payload: T = serde_json::from_value(envelope.data)
        .map_err(|err| malformed(key, format!("invalid payload: {err}")))?;
    payload
        .validate_payload()
        .map_err(|message| malformed(key, message))?;
    Ok(payload)
}

fn malformed(key: &str, message: String) -> CacheError {
    CacheError::Malformed {
        key: key.to_string(),
        message,
    }
}
