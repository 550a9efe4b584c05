// crates/incident-plane-core/src/core/hashing.rs
// ============================================================================
// Module: Incident Plane Canonical Hashing
// Description: RFC 8785 JSON canonicalization and SHA-256 digest helpers.
// Purpose: Provide the single deterministic hashing primitive behind all IDs.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every identity in the pipeline is derived by hashing canonical bytes with
//! SHA-256 and encoding the digest as lowercase hex. JSON values are
//! canonicalized with RFC 8785 (JCS), which sorts object keys recursively at
//! every depth while preserving array order. Two implementations that
//! canonicalize and hash the same inputs produce identical identifiers across
//! languages; this module is the only place digests are computed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes raw bytes with SHA-256 and returns the lowercase hex digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Hashes the canonical JSON form of a value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn sha256_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Returns true when a string is a 64-character lowercase hex digest.
#[must_use]
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use serde_json::json;

    use super::is_sha256_hex;
    use super::sha256_canonical_json;
    use super::sha256_hex;

    /// Tests that key order does not change the canonical hash.
    #[test]
    fn test_canonical_hash_ignores_key_order() {
        let left = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let right = json!({"a": {"c": 3, "d": 2}, "b": 1});
        assert_eq!(
            sha256_canonical_json(&left).unwrap(),
            sha256_canonical_json(&right).unwrap()
        );
    }

    /// Tests that array order is preserved by canonicalization.
    #[test]
    fn test_canonical_hash_preserves_array_order() {
        let left = json!([1, 2, 3]);
        let right = json!([3, 2, 1]);
        assert_ne!(
            sha256_canonical_json(&left).unwrap(),
            sha256_canonical_json(&right).unwrap()
        );
    }

    /// Tests the digest shape predicate.
    #[test]
    fn test_digest_shape() {
        let digest = sha256_hex(b"signal");
        assert_eq!(digest.len(), 64);
        assert!(is_sha256_hex(&digest));
        assert!(!is_sha256_hex("SIGNAL"));
    }
}
