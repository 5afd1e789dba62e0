//! The ledger handle: the unified producer API.
//!
//! A [`Ledger`] owns the signing keypair, the agent identity, the running
//! sequence counter, and the canonical bytes of the most recently appended
//! signing surface. `append` is strictly serialized; the sequence number
//! reflects invocation order exactly.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use guardclaw_core::{
    causal_hash_from_canonical_bytes, genesis_hash, gef_timestamp_millis, random_nonce_hex,
    Ed25519PublicKey, Envelope, Keypair, RecordType, UnsignedEnvelope,
};

use crate::error::LedgerError;
use crate::writer::LedgerWriter;

/// An open, exclusively-owned evidence ledger for one agent under one key.
pub struct Ledger {
    writer: LedgerWriter,
    keypair: Keypair,
    agent_id: String,
    /// `(sequence, canonical signing bytes)` of the last appended envelope.
    /// `None` while the ledger is empty.
    last: Option<(u64, Vec<u8>)>,
}

impl Ledger {
    /// Open or create the ledger file at `path`.
    ///
    /// Takes the exclusive writer lock and recovers `(last sequence, last
    /// canonical bytes)` from disk, so appends resume the chain exactly
    /// where it left off.
    pub fn open(
        path: impl AsRef<Path>,
        keypair: Keypair,
        agent_id: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        let agent_id = agent_id.into();
        let (writer, recovered) = LedgerWriter::open(path)?;
        info!(
            path = %writer.path().display(),
            agent_id,
            entries = recovered.entries,
            "ledger opened"
        );
        Ok(Self {
            writer,
            keypair,
            agent_id,
            last: recovered.last,
        })
    }

    /// Build, sign, and durably append one envelope.
    ///
    /// The step order is contractual: causal hash from the predecessor's
    /// canonical bytes (genesis sentinel on an empty ledger), next sequence,
    /// fresh CSPRNG nonce, truncated-millisecond UTC timestamp,
    /// schema-validated build, canonicalize, sign, write. In-memory state
    /// advances only after the writer confirms the line is appended; a
    /// failed append leaves the handle unchanged and is safe to retry.
    pub fn append(
        &mut self,
        record_type: RecordType,
        payload: Map<String, Value>,
    ) -> Result<Envelope, LedgerError> {
        let causal_hash = match &self.last {
            None => genesis_hash(),
            Some((_, bytes)) => causal_hash_from_canonical_bytes(bytes),
        };
        let sequence = match &self.last {
            None => 0,
            Some((seq, _)) => seq + 1,
        };
        let nonce = random_nonce_hex();
        let timestamp = gef_timestamp_millis();

        let unsigned = UnsignedEnvelope::build(
            record_type,
            &self.agent_id,
            &self.keypair.public_key().to_hex(),
            sequence,
            &nonce,
            &timestamp,
            &causal_hash,
            payload,
        )?;
        let canonical_bytes = unsigned.canonical_signing_bytes()?;
        let envelope = unsigned.sign(&self.keypair)?;

        let line = envelope.to_line()?;
        self.writer.append_line(&line)?;

        self.last = Some((sequence, canonical_bytes));
        debug!(sequence, record_type = %record_type, "envelope appended");
        Ok(envelope)
    }

    /// Force appended envelopes to stable storage.
    pub fn sync(&self) -> Result<(), LedgerError> {
        self.writer.sync()
    }

    /// Flush, sync, and release the ledger.
    pub fn close(self) -> Result<(), LedgerError> {
        self.writer.sync()
    }

    /// True while no envelope has been appended or recovered.
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// The sequence the next appended envelope will carry.
    pub fn next_sequence(&self) -> u64 {
        match &self.last {
            None => 0,
            Some((seq, _)) => seq + 1,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }
}
