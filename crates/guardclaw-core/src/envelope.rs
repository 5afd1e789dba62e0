//! The GEF envelope: one signed evidence record.
//!
//! An envelope is immutable once signed. It carries exactly eleven fields;
//! the ten-field projection that omits `signature` is the *signing surface*,
//! the sole input to both the envelope's signature and the next envelope's
//! `causal_hash`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::canonical::canonicalize;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::{CoreError, SchemaError, SchemaIssue};
use crate::timestamp::validate_gef_timestamp;
use crate::validation::{is_lowercase_hex, CAUSAL_HASH_FIELD_LEN, NONCE_FIELD_LEN, PUBLIC_KEY_FIELD_LEN};

/// The protocol version this crate implements.
pub const GEF_VERSION: &str = "1.0";

/// The kind of record an envelope carries.
///
/// This is the closed registry for `gef_version` 1.0. The core treats
/// payloads opaquely beyond "is a JSON object"; payload semantics per
/// record type are application-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// An action the agent performed.
    Execution,
    /// A declared intention to act.
    Intent,
    /// The outcome of a prior action.
    Result,
    /// A failed action.
    Failure,
}

impl RecordType {
    pub const ALL: [RecordType; 4] = [
        RecordType::Execution,
        RecordType::Intent,
        RecordType::Result,
        RecordType::Failure,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RecordType::Execution => "execution",
            RecordType::Intent => "intent",
            RecordType::Result => "result",
            RecordType::Failure => "failure",
        }
    }

    /// Parse a wire value against the 1.0 registry.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "execution" => Some(RecordType::Execution),
            "intent" => Some(RecordType::Intent),
            "result" => Some(RecordType::Result),
            "failure" => Some(RecordType::Failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, signed envelope. Field order matches the wire schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub gef_version: String,
    pub record_id: String,
    pub record_type: RecordType,
    pub agent_id: String,
    pub signer_public_key: String,
    pub sequence: u64,
    pub nonce: String,
    pub timestamp: String,
    pub causal_hash: String,
    pub payload: Map<String, Value>,
    pub signature: String,
}

impl Envelope {
    /// The ten-field signing surface as a JSON value.
    pub fn signing_surface_value(&self) -> Value {
        surface_value(
            &self.gef_version,
            &self.record_id,
            self.record_type,
            &self.agent_id,
            &self.signer_public_key,
            self.sequence,
            &self.nonce,
            &self.timestamp,
            &self.causal_hash,
            &self.payload,
        )
    }

    /// The projection the next envelope's `causal_hash` is computed over.
    ///
    /// Defined equal to [`Self::signing_surface_value`]; the protocol
    /// requires the two never diverge.
    pub fn chain_surface_value(&self) -> Value {
        self.signing_surface_value()
    }

    /// RFC 8785 canonical bytes of the signing surface.
    pub fn canonical_signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        canonicalize(&self.signing_surface_value())
    }

    /// Verify the signature against the embedded `signer_public_key`.
    ///
    /// Returns `false` on any failure, including malformed key or
    /// signature encodings.
    pub fn verify_signature(&self) -> bool {
        let Ok(key) = Ed25519PublicKey::from_hex(&self.signer_public_key) else {
            return false;
        };
        self.verify_signature_with(&key)
    }

    /// Verify the signature against a caller-supplied (policy) key.
    pub fn verify_signature_with(&self, key: &Ed25519PublicKey) -> bool {
        let Ok(sig) = Ed25519Signature::from_base64url(&self.signature) else {
            return false;
        };
        let Ok(bytes) = self.canonical_signing_bytes() else {
            return false;
        };
        key.verify(&bytes, &sig)
    }

    /// Serialize as a single JSON line for the JSONL ledger (no trailing
    /// newline; the writer appends exactly one `\n`).
    pub fn to_line(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Strict parse from a stored JSON line. Unknown or missing fields fail.
    pub fn from_line(line: &str) -> Result<Self, CoreError> {
        serde_json::from_str(line).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// A schema-validated envelope that has not been signed yet.
///
/// Construction validates every field; an envelope that fails validation is
/// never emitted. [`UnsignedEnvelope::sign`] finalizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedEnvelope {
    gef_version: String,
    record_id: String,
    record_type: RecordType,
    agent_id: String,
    signer_public_key: String,
    sequence: u64,
    nonce: String,
    timestamp: String,
    causal_hash: String,
    payload: Map<String, Value>,
}

impl UnsignedEnvelope {
    /// Build an unsigned envelope with a generated UUIDv4 `record_id`.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        record_type: RecordType,
        agent_id: &str,
        signer_public_key_hex: &str,
        sequence: u64,
        nonce_hex: &str,
        timestamp: &str,
        causal_hash_hex: &str,
        payload: Map<String, Value>,
    ) -> Result<Self, SchemaError> {
        Self::from_parts(
            Uuid::new_v4().to_string(),
            record_type,
            agent_id,
            signer_public_key_hex,
            sequence,
            nonce_hex,
            timestamp,
            causal_hash_hex,
            payload,
        )
    }

    /// Build with an explicit `record_id` (fixtures, cross-implementation
    /// vectors).
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        record_id: String,
        record_type: RecordType,
        agent_id: &str,
        signer_public_key_hex: &str,
        sequence: u64,
        nonce_hex: &str,
        timestamp: &str,
        causal_hash_hex: &str,
        payload: Map<String, Value>,
    ) -> Result<Self, SchemaError> {
        let mut issues = Vec::new();

        if record_id.is_empty() {
            issues.push(SchemaIssue::new("record_id", "must be non-empty"));
        }
        if agent_id.is_empty() {
            issues.push(SchemaIssue::new("agent_id", "must be non-empty"));
        }
        if !is_lowercase_hex(signer_public_key_hex, PUBLIC_KEY_FIELD_LEN) {
            issues.push(SchemaIssue::new(
                "signer_public_key",
                "must be exactly 64 lowercase hex characters",
            ));
        }
        if !is_lowercase_hex(nonce_hex, NONCE_FIELD_LEN) {
            issues.push(SchemaIssue::new(
                "nonce",
                "must be exactly 32 lowercase hex characters",
            ));
        }
        if !validate_gef_timestamp(timestamp) {
            issues.push(SchemaIssue::new(
                "timestamp",
                "must match YYYY-MM-DDTHH:MM:SS.sssZ",
            ));
        }
        if !is_lowercase_hex(causal_hash_hex, CAUSAL_HASH_FIELD_LEN) {
            issues.push(SchemaIssue::new(
                "causal_hash",
                "must be exactly 64 lowercase hex characters",
            ));
        }

        if !issues.is_empty() {
            return Err(SchemaError::new(issues));
        }

        Ok(Self {
            gef_version: GEF_VERSION.to_string(),
            record_id,
            record_type,
            agent_id: agent_id.to_string(),
            signer_public_key: signer_public_key_hex.to_string(),
            sequence,
            nonce: nonce_hex.to_string(),
            timestamp: timestamp.to_string(),
            causal_hash: causal_hash_hex.to_string(),
            payload,
        })
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The ten-field signing surface as a JSON value.
    pub fn signing_surface_value(&self) -> Value {
        surface_value(
            &self.gef_version,
            &self.record_id,
            self.record_type,
            &self.agent_id,
            &self.signer_public_key,
            self.sequence,
            &self.nonce,
            &self.timestamp,
            &self.causal_hash,
            &self.payload,
        )
    }

    /// RFC 8785 canonical bytes of the signing surface.
    pub fn canonical_signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        canonicalize(&self.signing_surface_value())
    }

    /// Sign the canonical surface bytes and attach the signature,
    /// finalizing the envelope.
    pub fn sign(self, keypair: &Keypair) -> Result<Envelope, CoreError> {
        let bytes = self.canonical_signing_bytes()?;
        let signature = keypair.sign(&bytes).to_base64url();
        Ok(Envelope {
            gef_version: self.gef_version,
            record_id: self.record_id,
            record_type: self.record_type,
            agent_id: self.agent_id,
            signer_public_key: self.signer_public_key,
            sequence: self.sequence,
            nonce: self.nonce,
            timestamp: self.timestamp,
            causal_hash: self.causal_hash,
            payload: self.payload,
            signature,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn surface_value(
    gef_version: &str,
    record_id: &str,
    record_type: RecordType,
    agent_id: &str,
    signer_public_key: &str,
    sequence: u64,
    nonce: &str,
    timestamp: &str,
    causal_hash: &str,
    payload: &Map<String, Value>,
) -> Value {
    let mut map = Map::with_capacity(10);
    map.insert("gef_version".into(), Value::String(gef_version.into()));
    map.insert("record_id".into(), Value::String(record_id.into()));
    map.insert(
        "record_type".into(),
        Value::String(record_type.as_str().into()),
    );
    map.insert("agent_id".into(), Value::String(agent_id.into()));
    map.insert(
        "signer_public_key".into(),
        Value::String(signer_public_key.into()),
    );
    map.insert("sequence".into(), Value::from(sequence));
    map.insert("nonce".into(), Value::String(nonce.into()));
    map.insert("timestamp".into(), Value::String(timestamp.into()));
    map.insert("causal_hash".into(), Value::String(causal_hash.into()));
    map.insert("payload".into(), Value::Object(payload.clone()));
    Value::Object(map)
}
