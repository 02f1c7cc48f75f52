//! Deterministic canonicalization and content hashing.
//!
//! Identical logical input yields identical digests regardless of channel or
//! client library: object keys are sorted recursively, no insignificant
//! whitespace is emitted, and number formatting is serde_json's own,
//! locale-independent rendering. Digests are blake3 hex, 64 characters.

#![deny(unsafe_code)]

use ledger_types::{DeclaredMetadata, EvidencePayload};
use serde_json::{Map, Value};
use thiserror::Error;

/// Hex digest length for blake3.
pub const DIGEST_HEX_LEN: usize = 64;

/// Canonicalization and hashing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalError {
    /// Absence of payload or metadata content is a hard error, never
    /// silently defaulted. Maps to error code `NO_HASH_COMPUTED`.
    #[error("no hash computed: {0}")]
    NoHashComputed(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Rebuild a JSON value with every object's keys in sorted order, at every
/// nesting level.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::with_capacity(sorted.len());
            for (key, inner) in sorted {
                out.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize a value in canonical form: sorted keys, compact separators.
pub fn canonical_json(value: &Value) -> Result<String, CanonicalError> {
    serde_json::to_string(&canonicalize(value))
        .map_err(|e| CanonicalError::Serialization(e.to_string()))
}

fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn hash_value(value: &Value) -> Result<String, CanonicalError> {
    Ok(hash_bytes(canonical_json(value)?.as_bytes()))
}

/// Digest of the submitted payload.
///
/// Raw bytes are hashed directly. Structured values are hashed over their
/// canonical serialization. Digest-only references hash the declared digest
/// together with its locator, so two pushes naming different upstream
/// objects never collide.
pub fn hash_payload(payload: &EvidencePayload) -> Result<String, CanonicalError> {
    if payload.is_empty() {
        return Err(CanonicalError::NoHashComputed(
            "payload carries no content".to_string(),
        ));
    }

    match payload {
        EvidencePayload::Bytes { content } => Ok(hash_bytes(content)),
        EvidencePayload::Structured { value } => hash_value(value),
        EvidencePayload::DigestReference {
            external_digest,
            locator,
        } => hash_value(&serde_json::json!({
            "external_digest": external_digest,
            "locator": locator,
        })),
    }
}

/// Digest of the declared-metadata object.
pub fn hash_metadata(metadata: &DeclaredMetadata) -> Result<String, CanonicalError> {
    let value =
        serde_json::to_value(metadata).map_err(|e| CanonicalError::Serialization(e.to_string()))?;
    let non_empty = value
        .as_object()
        .is_some_and(|map| map.values().any(|v| !v.is_null()));
    if !non_empty {
        return Err(CanonicalError::NoHashComputed(
            "declared metadata carries no content".to_string(),
        ));
    }
    hash_value(&value)
}
