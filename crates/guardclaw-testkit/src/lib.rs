//! # GuardClaw Testkit
//!
//! Shared test tooling: a fixed-seed identity, in-memory chain builders,
//! ledger-file helpers, and proptest generators. Test-only; nothing here
//! belongs in a production dependency graph.

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    fixed_keypair, ledger_lines, payload, raw_causal_hash, raw_object, resign_object,
    write_ledger, write_raw_ledger, ChainBuilder,
};
