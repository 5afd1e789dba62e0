//! # GuardClaw Core
//!
//! Pure primitives for the GuardClaw Execution Framework (GEF) protocol v1.0:
//! envelopes, canonicalization, and chain computation.
//!
//! This crate contains no I/O. It is pure computation over cryptographic
//! data structures; the ledger writer and replay engine live in
//! `guardclaw-ledger`.
//!
//! ## Key Types
//!
//! - [`Envelope`] - One signed evidence record, the atomic unit of a ledger
//! - [`UnsignedEnvelope`] - A schema-validated envelope awaiting its signature
//! - [`RecordType`] - Closed registry of record types for `gef_version` 1.0
//! - [`Keypair`] - Ed25519 signing identity
//!
//! ## Canonicalization
//!
//! Every signature and every causal hash is computed over the RFC 8785 (JCS)
//! encoding of the ten-field signing surface. See [`canonical`].

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod timestamp;
pub mod validation;

pub use canonical::{canonicalize, canonical_hash};
pub use chain::{
    causal_hash_from_canonical_bytes, compute_causal_hash, genesis_hash, GENESIS_HASH,
};
pub use crypto::{random_nonce_hex, Ed25519PublicKey, Ed25519Signature, Keypair, Sha256Hash};
pub use envelope::{Envelope, RecordType, UnsignedEnvelope, GEF_VERSION};
pub use error::{CoreError, SchemaError, SchemaIssue};
pub use timestamp::{gef_timestamp_millis, validate_gef_timestamp};
pub use validation::{
    validate_envelope_object, ObjectValidation, CAUSAL_HASH_FIELD_LEN, NONCE_FIELD_LEN,
    PUBLIC_KEY_FIELD_LEN,
};
