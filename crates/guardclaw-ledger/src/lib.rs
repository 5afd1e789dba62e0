//! # GuardClaw Ledger
//!
//! The on-disk half of the GuardClaw Execution Framework: the append-only
//! JSONL ledger writer, the signing ledger handle, and the replay
//! verification engine.
//!
//! ## Producing evidence
//!
//! ```no_run
//! use guardclaw_core::{Keypair, RecordType};
//! use guardclaw_ledger::Ledger;
//! use serde_json::Map;
//!
//! let keypair = Keypair::generate();
//! let mut ledger = Ledger::open("audit.jsonl", keypair, "agent-prod-001")?;
//!
//! let mut payload = Map::new();
//! payload.insert("endpoint".into(), "/deploy".into());
//! ledger.append(RecordType::Execution, payload)?;
//! # Ok::<(), guardclaw_ledger::LedgerError>(())
//! ```
//!
//! ## Verifying evidence
//!
//! ```no_run
//! use guardclaw_ledger::ReplayEngine;
//!
//! let summary = ReplayEngine::new().verify_file("audit.jsonl")?;
//! assert!(summary.overall_valid);
//! # Ok::<(), guardclaw_ledger::ReplayError>(())
//! ```
//!
//! A third party holding only the signer's public key can run the replay
//! engine offline; producer and verifier share the canonicalization, chain,
//! and crypto layers of `guardclaw-core` exactly.

mod error;
mod handle;
mod replay;
mod writer;

pub use error::{LedgerError, ReplayError};
pub use handle::Ledger;
pub use replay::{
    ChainViolation, ReplayEngine, ReplaySummary, ReplayWarning, ViolationKind,
};
pub use writer::{LedgerWriter, RecoveredState};
