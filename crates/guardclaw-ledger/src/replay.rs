//! The replay engine: offline ledger verification.
//!
//! Consumes a JSONL ledger line by line and re-derives every protocol
//! guarantee from scratch: schema, sequence continuity, causal chain, nonce
//! and record-id uniqueness, and per-envelope signatures. Verification is
//! two-phase per entry, structural first and signature second, and the engine
//! continues after violations so callers get a complete audit picture
//! rather than a first-error-wins truncation.
//!
//! Violations are data. The only fatal condition is a ledger whose first
//! entry declares a `gef_version` major this verifier does not implement.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use guardclaw_core::validation::{is_supported_version, parse_version};
use guardclaw_core::{
    canonicalize, causal_hash_from_canonical_bytes, genesis_hash, validate_envelope_object,
    Ed25519PublicKey, Ed25519Signature,
};

use crate::error::ReplayError;

/// The closed set of violation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Schema,
    SequenceGap,
    ChainBreak,
    InvalidSignature,
}

impl ViolationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ViolationKind::Schema => "schema",
            ViolationKind::SequenceGap => "sequence_gap",
            ViolationKind::ChainBreak => "chain_break",
            ViolationKind::InvalidSignature => "invalid_signature",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inconsistency discovered during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainViolation {
    pub kind: ViolationKind,
    /// Zero-based ledger position of the offending entry.
    pub at_sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ChainViolation {
    fn new(kind: ViolationKind, at_sequence: u64, detail: impl Into<String>) -> Self {
        Self {
            kind,
            at_sequence,
            record_id: None,
            detail: detail.into(),
            expected: None,
            actual: None,
        }
    }
}

/// A non-fatal observation, currently only unknown record types in a
/// newer-minor-version ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayWarning {
    pub at_sequence: u64,
    pub detail: String,
}

/// The typed report produced by one verification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    /// Lines attempted, including unparseable ones.
    pub total_entries: u64,
    /// Ordered list of everything found wrong.
    pub violations: Vec<ChainViolation>,
    pub warnings: Vec<ReplayWarning>,

    pub schema_valid: bool,
    pub chain_valid: bool,
    pub signatures_valid: bool,
    pub overall_valid: bool,

    /// The ledger's declared version (from entry 0).
    pub gef_version: Option<String>,
    pub record_type_counts: BTreeMap<String, u64>,
    pub agents_seen: Vec<String>,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub valid_signatures: u64,
    pub invalid_signatures: u64,

    /// `hex(SHA-256(JCS(signing_surface(last entry))))`: the causal hash
    /// any subsequent entry would carry. A deterministic commitment to the
    /// whole ledger, suitable for external anchoring.
    pub head_hash: Option<String>,
    pub head_sequence: Option<u64>,
}

/// Offline verifier for GEF ledgers.
///
/// Stateless between runs; construct once and verify as many ledgers as
/// needed. With a policy key, every entry's `signer_public_key` must equal
/// that key. Without one, each entry verifies against its own embedded key,
/// which is useful for inspection but only proves self-consistency.
#[derive(Debug, Default)]
pub struct ReplayEngine {
    policy_key: Option<Ed25519PublicKey>,
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every envelope to be signed by `key`.
    pub fn with_policy_key(key: Ed25519PublicKey) -> Self {
        Self {
            policy_key: Some(key),
        }
    }

    /// Verify a ledger file.
    pub fn verify_file(&self, path: impl AsRef<Path>) -> Result<ReplaySummary, ReplayError> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "replay started");
        self.verify_reader(BufReader::new(file))
    }

    /// Verify ledger lines from any buffered reader.
    pub fn verify_reader<R: BufRead>(&self, reader: R) -> Result<ReplaySummary, ReplayError> {
        let mut run = ReplayRun::new(self.policy_key.as_ref());

        for line in reader.lines() {
            let line = line?;
            run.consume_line(line.trim_end_matches('\r'))?;
        }

        Ok(run.finish())
    }
}

/// Per-run scratch state. Owned by the engine for the duration of one
/// verification and discarded afterwards.
struct ReplayRun<'a> {
    policy_key: Option<&'a Ed25519PublicKey>,

    position: u64,
    ledger_version: Option<String>,
    /// Entry 0 declared `1.y` with `y > 0`: unknown record types become
    /// warnings instead of violations.
    forward_compat: bool,
    last_canonical: Option<Vec<u8>>,
    head_sequence: Option<u64>,
    seen_nonces: HashSet<String>,
    seen_record_ids: HashSet<String>,

    violations: Vec<ChainViolation>,
    warnings: Vec<ReplayWarning>,
    record_type_counts: BTreeMap<String, u64>,
    agents_seen: BTreeSet<String>,
    first_timestamp: Option<String>,
    last_timestamp: Option<String>,
    valid_signatures: u64,
    invalid_signatures: u64,
}

impl<'a> ReplayRun<'a> {
    fn new(policy_key: Option<&'a Ed25519PublicKey>) -> Self {
        Self {
            policy_key,
            position: 0,
            ledger_version: None,
            forward_compat: false,
            last_canonical: None,
            head_sequence: None,
            seen_nonces: HashSet::new(),
            seen_record_ids: HashSet::new(),
            violations: Vec::new(),
            warnings: Vec::new(),
            record_type_counts: BTreeMap::new(),
            agents_seen: BTreeSet::new(),
            first_timestamp: None,
            last_timestamp: None,
            valid_signatures: 0,
            invalid_signatures: 0,
        }
    }

    fn consume_line(&mut self, line: &str) -> Result<(), ReplayError> {
        let position = self.position;
        self.position += 1;

        // Phase 1, step 1: parse. A line that is not a JSON object yields a
        // single schema violation and nothing else can be checked.
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                self.push(ChainViolation::new(
                    ViolationKind::Schema,
                    position,
                    format!("malformed JSON: {e}"),
                ));
                return Ok(());
            }
        };
        let Some(object) = value.as_object() else {
            self.push(ChainViolation::new(
                ViolationKind::Schema,
                position,
                "entry is not a JSON object",
            ));
            return Ok(());
        };

        let record_id = object
            .get("record_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        // Version gate. An unsupported major at position 0 is the one
        // condition that halts verification outright.
        self.check_version(position, object)?;

        // Step 2: schema.
        let validation = validate_envelope_object(object);
        let mut schema_failed = false;
        for issue in &validation.issues {
            schema_failed = true;
            let mut v = ChainViolation::new(ViolationKind::Schema, position, issue.to_string());
            v.record_id = record_id.clone();
            self.push(v);
        }
        if let Some(unknown) = &validation.unknown_record_type {
            if self.forward_compat {
                self.warnings.push(ReplayWarning {
                    at_sequence: position,
                    detail: format!(
                        "record_type {unknown:?} is not registered for gef_version 1.0"
                    ),
                });
            } else {
                schema_failed = true;
                let mut v = ChainViolation::new(
                    ViolationKind::Schema,
                    position,
                    format!("unknown record_type {unknown:?}"),
                );
                v.record_id = record_id.clone();
                self.push(v);
            }
        }

        // Policy key, when supplied, binds every entry.
        if let (Some(policy), Some(stored)) = (
            self.policy_key,
            object.get("signer_public_key").and_then(Value::as_str),
        ) {
            let expected = policy.to_hex();
            if stored != expected {
                schema_failed = true;
                let mut v = ChainViolation::new(
                    ViolationKind::Schema,
                    position,
                    "signer_public_key does not match the trusted policy key",
                );
                v.record_id = record_id.clone();
                v.expected = Some(expected);
                v.actual = Some(stored.to_string());
                self.push(v);
            }
        }

        // Step 3: sequence continuity.
        if let Some(stored_seq) = object.get("sequence").and_then(Value::as_u64) {
            if stored_seq != position {
                let mut v = ChainViolation::new(
                    ViolationKind::SequenceGap,
                    position,
                    "stored sequence does not match ledger position",
                );
                v.record_id = record_id.clone();
                v.expected = Some(position.to_string());
                v.actual = Some(stored_seq.to_string());
                self.push(v);
            }
        }

        // Step 4: causal chain.
        let expected_hash = match &self.last_canonical {
            None => genesis_hash(),
            Some(bytes) => causal_hash_from_canonical_bytes(bytes),
        };
        if let Some(stored_hash) = object.get("causal_hash").and_then(Value::as_str) {
            if stored_hash != expected_hash {
                let mut v = ChainViolation::new(
                    ViolationKind::ChainBreak,
                    position,
                    "causal_hash does not match the preceding signing surface",
                );
                v.record_id = record_id.clone();
                v.expected = Some(expected_hash);
                v.actual = Some(stored_hash.to_string());
                self.push(v);
            }
        }

        // Step 5: uniqueness. Nonces and record ids enter the seen sets
        // whether or not they are duplicates.
        if let Some(nonce) = object.get("nonce").and_then(Value::as_str) {
            if !self.seen_nonces.insert(nonce.to_string()) {
                let mut v =
                    ChainViolation::new(ViolationKind::Schema, position, "duplicate nonce");
                v.record_id = record_id.clone();
                self.push(v);
            }
        }
        if let Some(id) = &record_id {
            if !self.seen_record_ids.insert(id.clone()) {
                let mut v =
                    ChainViolation::new(ViolationKind::Schema, position, "duplicate record_id");
                v.record_id = record_id.clone();
                self.push(v);
            }
        }

        self.record_observations(object);

        // Step 6: this entry's surface becomes the chain predecessor for the
        // next one, whether or not its signature holds. Chain integrity is
        // independent of signature validity.
        let surface_bytes = {
            let mut surface: Map<String, Value> = object.clone();
            surface.remove("signature");
            canonicalize(&Value::Object(surface)).ok()
        };
        if let Some(bytes) = surface_bytes {
            self.last_canonical = Some(bytes);
            self.head_sequence = object.get("sequence").and_then(Value::as_u64);
        }

        // Phase 2: signature, skipped for entries that failed schema.
        if !schema_failed {
            self.verify_signature(position, record_id, object);
        }

        Ok(())
    }

    fn check_version(
        &mut self,
        position: u64,
        object: &Map<String, Value>,
    ) -> Result<(), ReplayError> {
        let declared = object.get("gef_version").and_then(Value::as_str);

        if position == 0 {
            if let Some(version) = declared {
                if let Some((major, minor)) = parse_version(version) {
                    if major != 1 {
                        return Err(ReplayError::UnsupportedVersion {
                            found: version.to_string(),
                        });
                    }
                    self.forward_compat = minor > 0;
                }
                self.ledger_version = Some(version.to_string());
            }
            return Ok(());
        }

        // All entries must carry the version declared at entry 0.
        if let (Some(ledger_version), Some(version)) = (self.ledger_version.clone(), declared) {
            if version != ledger_version && is_supported_version(version) {
                let mut v = ChainViolation::new(
                    ViolationKind::Schema,
                    position,
                    "gef_version differs from the ledger version at entry 0",
                );
                v.expected = Some(ledger_version);
                v.actual = Some(version.to_string());
                self.push(v);
            }
        }
        Ok(())
    }

    fn verify_signature(
        &mut self,
        position: u64,
        record_id: Option<String>,
        object: &Map<String, Value>,
    ) {
        let key = object
            .get("signer_public_key")
            .and_then(Value::as_str)
            .and_then(|hex| Ed25519PublicKey::from_hex(hex).ok());
        let signature = object
            .get("signature")
            .and_then(Value::as_str)
            .and_then(|s| Ed25519Signature::from_base64url(s).ok());

        let verified = match (key, signature, &self.last_canonical) {
            (Some(key), Some(sig), Some(bytes)) => key.verify(bytes, &sig),
            _ => false,
        };

        if verified {
            self.valid_signatures += 1;
        } else {
            self.invalid_signatures += 1;
            let mut v = ChainViolation::new(
                ViolationKind::InvalidSignature,
                position,
                "Ed25519 verification failed over the canonical signing surface",
            );
            v.record_id = record_id;
            self.push(v);
        }
    }

    fn record_observations(&mut self, object: &Map<String, Value>) {
        if let Some(rt) = object.get("record_type").and_then(Value::as_str) {
            *self.record_type_counts.entry(rt.to_string()).or_insert(0) += 1;
        }
        if let Some(agent) = object.get("agent_id").and_then(Value::as_str) {
            self.agents_seen.insert(agent.to_string());
        }
        if let Some(ts) = object.get("timestamp").and_then(Value::as_str) {
            if self.first_timestamp.is_none() {
                self.first_timestamp = Some(ts.to_string());
            }
            self.last_timestamp = Some(ts.to_string());
        }
    }

    fn push(&mut self, violation: ChainViolation) {
        warn!(
            kind = %violation.kind,
            at_sequence = violation.at_sequence,
            detail = %violation.detail,
            "replay violation"
        );
        self.violations.push(violation);
    }

    fn finish(self) -> ReplaySummary {
        let schema_valid = !self
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::Schema);
        let chain_valid = !self
            .violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::ChainBreak | ViolationKind::SequenceGap));
        let signatures_valid = !self
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::InvalidSignature);

        let head_hash = self
            .last_canonical
            .as_deref()
            .map(causal_hash_from_canonical_bytes);

        ReplaySummary {
            total_entries: self.position,
            violations: self.violations,
            warnings: self.warnings,
            schema_valid,
            chain_valid,
            signatures_valid,
            overall_valid: schema_valid && chain_valid && signatures_valid,
            gef_version: self.ledger_version,
            record_type_counts: self.record_type_counts,
            agents_seen: self.agents_seen.into_iter().collect(),
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_timestamp,
            valid_signatures: self.valid_signatures,
            invalid_signatures: self.invalid_signatures,
            head_hash,
            head_sequence: self.head_sequence,
        }
    }
}
