//! Deterministic fixtures for GuardClaw test suites.

use std::path::Path;

use serde_json::{Map, Value};

use guardclaw_core::{
    compute_causal_hash, genesis_hash, random_nonce_hex, Envelope, Keypair, RecordType,
    UnsignedEnvelope,
};

/// The keypair used across the test suites. Seed `0x42` repeated.
pub fn fixed_keypair() -> Keypair {
    Keypair::from_seed(&[0x42; 32])
}

/// A one-entry payload object.
pub fn payload(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.into(), value);
    map
}

/// Builds a correctly chained, signed sequence of envelopes in memory,
/// without touching the filesystem.
pub struct ChainBuilder {
    keypair: Keypair,
    agent_id: String,
    envelopes: Vec<Envelope>,
}

impl ChainBuilder {
    pub fn new(keypair: Keypair, agent_id: impl Into<String>) -> Self {
        Self {
            keypair,
            agent_id: agent_id.into(),
            envelopes: Vec::new(),
        }
    }

    /// Append one envelope with a deterministic timestamp and fresh nonce.
    pub fn push(&mut self, record_type: RecordType, payload: Map<String, Value>) -> &Envelope {
        let sequence = self.envelopes.len() as u64;
        let causal_hash = match self.envelopes.last() {
            None => genesis_hash(),
            Some(prev) => compute_causal_hash(prev).expect("canonicalizable surface"),
        };
        let envelope = UnsignedEnvelope::build(
            record_type,
            &self.agent_id,
            &self.keypair.public_key().to_hex(),
            sequence,
            &random_nonce_hex(),
            "2026-02-26T00:00:00.000Z",
            &causal_hash,
            payload,
        )
        .expect("fixture fields are valid")
        .sign(&self.keypair)
        .expect("fixture surface is canonicalizable");

        self.envelopes.push(envelope);
        self.envelopes.last().expect("just pushed")
    }

    /// Append `n` execution records with `{"step": i}` payloads.
    pub fn push_executions(&mut self, n: usize) -> &mut Self {
        for _ in 0..n {
            let step = self.envelopes.len() as u64;
            self.push(RecordType::Execution, payload("step", Value::from(step)));
        }
        self
    }

    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    pub fn into_envelopes(self) -> Vec<Envelope> {
        self.envelopes
    }
}

/// Serialize envelopes to JSONL ledger lines (each with its `\n`).
pub fn ledger_lines(envelopes: &[Envelope]) -> String {
    let mut out = String::new();
    for env in envelopes {
        out.push_str(&env.to_line().expect("serializable envelope"));
        out.push('\n');
    }
    out
}

/// Write envelopes to a ledger file at `path`.
pub fn write_ledger(path: &Path, envelopes: &[Envelope]) {
    std::fs::write(path, ledger_lines(envelopes)).expect("writable test ledger");
}

/// Write raw pre-rendered lines to a ledger file, for poisoned ledgers that
/// a typed envelope could never produce.
pub fn write_raw_ledger(path: &Path, lines: &[String]) {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    std::fs::write(path, out).expect("writable test ledger");
}

/// An envelope as a raw JSON object, for field-level tampering.
pub fn raw_object(envelope: &Envelope) -> Map<String, Value> {
    serde_json::to_value(envelope)
        .expect("serializable envelope")
        .as_object()
        .expect("envelope serializes to an object")
        .clone()
}

/// Re-sign a raw envelope object with `keypair` over its current surface,
/// replacing the stored signature. Used to craft ledgers that are
/// legitimately signed but violate ledger-level rules.
pub fn resign_object(object: &mut Map<String, Value>, keypair: &Keypair) {
    let mut surface = object.clone();
    surface.remove("signature");
    let bytes =
        guardclaw_core::canonicalize(&Value::Object(surface)).expect("canonicalizable surface");
    object.insert(
        "signature".into(),
        Value::String(keypair.sign(&bytes).to_base64url()),
    );
}

/// The causal hash a successor of this raw object must carry.
pub fn raw_causal_hash(object: &Map<String, Value>) -> String {
    let mut surface = object.clone();
    surface.remove("signature");
    guardclaw_core::canonical_hash(&Value::Object(surface)).expect("canonicalizable surface")
}
