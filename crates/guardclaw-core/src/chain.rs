//! The causal hash chain.
//!
//! Each envelope commits to its predecessor with
//! `causal_hash = hex(SHA-256(JCS(signing_surface(prev))))`. The chain hash
//! depends only on the signing surface, so the predecessor's `signature`
//! never influences it. The genesis entry carries a 64-zero sentinel.

use crate::canonical::canonicalize;
use crate::crypto::Sha256Hash;
use crate::envelope::Envelope;
use crate::error::CoreError;

/// The genesis sentinel: 64 zeros.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// The `causal_hash` value of a ledger's first entry.
pub fn genesis_hash() -> String {
    GENESIS_HASH.to_string()
}

/// Compute the causal hash a successor of `prev` must carry.
pub fn compute_causal_hash(prev: &Envelope) -> Result<String, CoreError> {
    let bytes = canonicalize(&prev.chain_surface_value())?;
    Ok(causal_hash_from_canonical_bytes(&bytes))
}

/// Causal hash from already-canonicalized signing-surface bytes.
///
/// The ledger handle keeps the last appended surface's canonical bytes so it
/// never re-canonicalizes the predecessor on the hot path.
pub fn causal_hash_from_canonical_bytes(bytes: &[u8]) -> String {
    Sha256Hash::hash(bytes).to_hex()
}
