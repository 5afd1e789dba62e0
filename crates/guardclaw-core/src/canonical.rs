//! Canonical JSON encoding per RFC 8785 (JCS).
//!
//! This is the ONLY canonicalization in GuardClaw. All signing, hashing,
//! and chain computation goes through this module.
//!
//! The canonical encoding is critical: the same signing surface must produce
//! identical bytes (and thus identical hashes and signatures) across every
//! conforming implementation, in any language. Key ordering, number
//! formatting, and string escaping all follow RFC 8785; we delegate to
//! `serde_jcs` rather than hand-rolling any of it.

use serde_json::Value;

use crate::crypto::Sha256Hash;
use crate::error::CoreError;

/// Encode a JSON value to RFC 8785 canonical bytes.
///
/// Output is deterministic regardless of map insertion order. The value must
/// be built only from objects, arrays, strings, booleans, null, integers,
/// and finite decimal numbers; non-representable values fail with
/// [`CoreError::Serialization`].
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CoreError> {
    serde_jcs::to_vec(value).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// SHA-256 of the RFC 8785 canonical form, as 64 lowercase hex characters.
///
/// Used for causal-hash chaining and record binding.
pub fn canonical_hash(value: &Value) -> Result<String, CoreError> {
    let bytes = canonicalize(value)?;
    Ok(Sha256Hash::hash(&bytes).to_hex())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_canonical_bytes_deterministic() {
        let value = json!({"b": 1, "a": {"y": true, "x": null}, "c": [1, 2, 3]});
        let b1 = canonicalize(&value).unwrap();
        let b2 = canonicalize(&value).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_key_order_independent_of_insertion() {
        let v1: Value = serde_json::from_str(r#"{"z": 1, "a": 2}"#).unwrap();
        let v2: Value = serde_json::from_str(r#"{"a": 2, "z": 1}"#).unwrap();
        assert_eq!(canonicalize(&v1).unwrap(), canonicalize(&v2).unwrap());
        assert_eq!(canonicalize(&v1).unwrap(), br#"{"a":2,"z":1}"#.to_vec());
    }

    #[test]
    fn test_no_whitespace_in_output() {
        let value = json!({"k": [1, 2], "m": {"n": "v"}});
        let bytes = canonicalize(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_nested_object_canonical_form() {
        let value = json!({"payload": {"b": 2, "a": 1}});
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(bytes, br#"{"payload":{"a":1,"b":2}}"#.to_vec());
    }

    #[test]
    fn test_canonical_hash_is_64_lowercase_hex() {
        let h = canonical_hash(&json!({"action": "test"})).unwrap();
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_unicode_key_ordering_by_code_point() {
        // "é" (U+00E9) sorts after every ASCII key.
        let v: Value = serde_json::from_str(r#"{"é": 1, "z": 2}"#).unwrap();
        let text = String::from_utf8(canonicalize(&v).unwrap()).unwrap();
        assert!(text.find("\"z\"").unwrap() < text.find('\u{00e9}').unwrap());
    }
}
