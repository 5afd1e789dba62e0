//! Wire-level schema validation.
//!
//! The replay engine validates parsed JSON objects before it trusts any
//! field, and the signer validates typed fields before it signs. Both paths
//! share the helpers here, so a ledger that validates at append time
//! validates identically at replay time.
//!
//! Validation reports every issue it finds as a typed list, never a single
//! collapsed string.

use serde_json::{Map, Value};

use crate::crypto::Ed25519Signature;
use crate::envelope::RecordType;
use crate::error::SchemaIssue;
use crate::timestamp::validate_gef_timestamp;

/// Hex length of a `signer_public_key` field (32-byte Ed25519 key).
pub const PUBLIC_KEY_FIELD_LEN: usize = 64;

/// Hex length of a `causal_hash` field (32-byte SHA-256 digest).
pub const CAUSAL_HASH_FIELD_LEN: usize = 64;

/// Hex length of a `nonce` field (16 CSPRNG bytes).
pub const NONCE_FIELD_LEN: usize = 32;

/// The eleven wire field names, in schema order.
pub const ENVELOPE_FIELDS: [&str; 11] = [
    "gef_version",
    "record_id",
    "record_type",
    "agent_id",
    "signer_public_key",
    "sequence",
    "nonce",
    "timestamp",
    "causal_hash",
    "payload",
    "signature",
];

/// True iff `s` is exactly `len` lowercase hex characters.
pub fn is_lowercase_hex(s: &str, len: usize) -> bool {
    s.len() == len
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Outcome of validating one parsed envelope object.
#[derive(Debug, Clone, Default)]
pub struct ObjectValidation {
    /// Every constraint violation found.
    pub issues: Vec<SchemaIssue>,
    /// Set when `record_type` is a well-formed string outside the 1.0
    /// registry. The replay engine decides whether this is a violation or,
    /// for a `1.y` (y > 0) ledger, only a warning.
    pub unknown_record_type: Option<String>,
}

impl ObjectValidation {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.unknown_record_type.is_none()
    }
}

/// Validate a parsed JSON object against the eleven-field envelope schema.
///
/// Checks the exact field set, JSON types, and every field-format
/// constraint. Does not check sequence position, chain linkage, or nonce
/// uniqueness; those are ledger-level properties owned by the replay engine.
pub fn validate_envelope_object(map: &Map<String, Value>) -> ObjectValidation {
    let mut v = ObjectValidation::default();

    for field in ENVELOPE_FIELDS {
        if !map.contains_key(field) {
            v.issues.push(SchemaIssue::new(field, "missing field"));
        }
    }
    for key in map.keys() {
        if !ENVELOPE_FIELDS.contains(&key.as_str()) {
            v.issues
                .push(SchemaIssue::new(key.clone(), "unknown field"));
        }
    }

    if let Some(value) = map.get("gef_version") {
        match value.as_str() {
            Some(version) => {
                if !is_supported_version(version) {
                    v.issues.push(SchemaIssue::new(
                        "gef_version",
                        format!("unsupported version {version:?}"),
                    ));
                }
            }
            None => v.issues.push(SchemaIssue::new("gef_version", "must be a string")),
        }
    }

    check_nonempty_string(map, "record_id", &mut v.issues);
    check_nonempty_string(map, "agent_id", &mut v.issues);

    if let Some(value) = map.get("record_type") {
        match value.as_str() {
            Some(rt) => {
                if RecordType::from_wire(rt).is_none() {
                    v.unknown_record_type = Some(rt.to_string());
                }
            }
            None => v
                .issues
                .push(SchemaIssue::new("record_type", "must be a string")),
        }
    }

    check_hex_string(map, "signer_public_key", PUBLIC_KEY_FIELD_LEN, &mut v.issues);
    check_hex_string(map, "nonce", NONCE_FIELD_LEN, &mut v.issues);
    check_hex_string(map, "causal_hash", CAUSAL_HASH_FIELD_LEN, &mut v.issues);

    if let Some(value) = map.get("sequence") {
        if value.as_u64().is_none() {
            v.issues.push(SchemaIssue::new(
                "sequence",
                "must be a non-negative integer",
            ));
        }
    }

    if let Some(value) = map.get("timestamp") {
        match value.as_str() {
            Some(ts) => {
                if !validate_gef_timestamp(ts) {
                    v.issues.push(SchemaIssue::new(
                        "timestamp",
                        "must match YYYY-MM-DDTHH:MM:SS.sssZ",
                    ));
                }
            }
            None => v
                .issues
                .push(SchemaIssue::new("timestamp", "must be a string")),
        }
    }

    if let Some(value) = map.get("payload") {
        if !value.is_object() {
            v.issues.push(SchemaIssue::new(
                "payload",
                "must be a JSON object",
            ));
        }
    }

    if let Some(value) = map.get("signature") {
        match value.as_str() {
            Some(sig) => {
                if Ed25519Signature::from_base64url(sig).is_err() {
                    v.issues.push(SchemaIssue::new(
                        "signature",
                        "must be 64 bytes of unpadded base64url",
                    ));
                }
            }
            None => v
                .issues
                .push(SchemaIssue::new("signature", "must be a string")),
        }
    }

    v
}

/// True iff the version string names a protocol this crate can verify
/// (major version 1).
pub fn is_supported_version(version: &str) -> bool {
    parse_version(version).map(|(major, _)| major == 1).unwrap_or(false)
}

/// Split a `"major.minor"` version string into numeric parts.
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    if !major.bytes().all(|b| b.is_ascii_digit()) || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn check_nonempty_string(map: &Map<String, Value>, field: &str, issues: &mut Vec<SchemaIssue>) {
    if let Some(value) = map.get(field) {
        match value.as_str() {
            Some("") => issues.push(SchemaIssue::new(field, "must be non-empty")),
            Some(_) => {}
            None => issues.push(SchemaIssue::new(field, "must be a string")),
        }
    }
}

fn check_hex_string(
    map: &Map<String, Value>,
    field: &str,
    len: usize,
    issues: &mut Vec<SchemaIssue>,
) {
    if let Some(value) = map.get(field) {
        match value.as_str() {
            Some(s) => {
                if !is_lowercase_hex(s, len) {
                    issues.push(SchemaIssue::new(
                        field,
                        format!("must be exactly {len} lowercase hex characters"),
                    ));
                }
            }
            None => issues.push(SchemaIssue::new(field, "must be a string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chain::genesis_hash;
    use crate::crypto::Keypair;
    use crate::envelope::{RecordType, UnsignedEnvelope};

    fn valid_object() -> Map<String, Value> {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let mut payload = Map::new();
        payload.insert("action".into(), json!("test"));
        let env = UnsignedEnvelope::build(
            RecordType::Execution,
            "agent-test-001",
            &keypair.public_key().to_hex(),
            0,
            "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4",
            "2026-02-26T00:00:00.000Z",
            &genesis_hash(),
            payload,
        )
        .unwrap()
        .sign(&keypair)
        .unwrap();
        serde_json::to_value(&env)
            .unwrap()
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_valid_envelope_is_clean() {
        let v = validate_envelope_object(&valid_object());
        assert!(v.is_clean(), "unexpected issues: {:?}", v.issues);
    }

    #[test]
    fn test_missing_field_reported() {
        let mut obj = valid_object();
        obj.remove("nonce");
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "nonce" && i.detail == "missing field"));
    }

    #[test]
    fn test_extra_field_reported() {
        let mut obj = valid_object();
        obj.insert("extra".into(), json!(true));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "extra"));
    }

    #[test]
    fn test_unknown_record_type_is_separate_channel() {
        let mut obj = valid_object();
        obj.insert("record_type".into(), json!("evil_type"));
        let v = validate_envelope_object(&obj);
        assert_eq!(v.unknown_record_type.as_deref(), Some("evil_type"));
        assert!(v.issues.is_empty());
    }

    #[test]
    fn test_uppercase_hex_rejected() {
        let mut obj = valid_object();
        let upper = obj["causal_hash"].as_str().unwrap().to_uppercase();
        obj.insert("causal_hash".into(), json!(upper));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "causal_hash"));
    }

    #[test]
    fn test_short_nonce_rejected() {
        let mut obj = valid_object();
        obj.insert("nonce".into(), json!("abc123"));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "nonce"));
    }

    #[test]
    fn test_short_public_key_rejected() {
        let mut obj = valid_object();
        obj.insert("signer_public_key".into(), json!("deadbeef"));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "signer_public_key"));
    }

    #[test]
    fn test_negative_sequence_rejected() {
        let mut obj = valid_object();
        obj.insert("sequence".into(), json!(-1));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "sequence"));
    }

    #[test]
    fn test_fractional_sequence_rejected() {
        let mut obj = valid_object();
        obj.insert("sequence".into(), json!(1.5));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "sequence"));
    }

    #[test]
    fn test_non_object_payload_rejected() {
        for bad in [json!([1, 2]), json!("scalar"), json!(null), json!(42)] {
            let mut obj = valid_object();
            obj.insert("payload".into(), bad);
            let v = validate_envelope_object(&obj);
            assert!(v.issues.iter().any(|i| i.field == "payload"));
        }
    }

    #[test]
    fn test_timestamp_without_fraction_rejected() {
        let mut obj = valid_object();
        obj.insert("timestamp".into(), json!("2026-02-26T00:00:00Z"));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "timestamp"));
    }

    #[test]
    fn test_padded_signature_rejected() {
        let mut obj = valid_object();
        let padded = format!("{}==", obj["signature"].as_str().unwrap());
        obj.insert("signature".into(), json!(padded));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "signature"));
    }

    #[test]
    fn test_major_version_two_unsupported() {
        let mut obj = valid_object();
        obj.insert("gef_version".into(), json!("2.0"));
        let v = validate_envelope_object(&obj);
        assert!(v.issues.iter().any(|i| i.field == "gef_version"));
    }

    #[test]
    fn test_minor_version_bump_supported() {
        let mut obj = valid_object();
        obj.insert("gef_version".into(), json!("1.3"));
        let v = validate_envelope_object(&obj);
        assert!(!v.issues.iter().any(|i| i.field == "gef_version"));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.0"), Some((1, 0)));
        assert_eq!(parse_version("2.7"), Some((2, 7)));
        assert_eq!(parse_version("1"), None);
        assert_eq!(parse_version("one.zero"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_is_lowercase_hex() {
        assert!(is_lowercase_hex(&"a".repeat(64), 64));
        assert!(is_lowercase_hex("0123456789abcdef0123456789abcdef", 32));
        assert!(!is_lowercase_hex(&"A".repeat(64), 64));
        assert!(!is_lowercase_hex(&"a".repeat(63), 64));
        assert!(!is_lowercase_hex(&"g".repeat(64), 64));
    }
}
