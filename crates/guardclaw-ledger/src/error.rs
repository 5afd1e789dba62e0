//! Error types for ledger operations.

use std::path::PathBuf;

use thiserror::Error;

use guardclaw_core::{CoreError, SchemaError};

/// Errors from opening or appending to a ledger.
///
/// Schema errors abort the append and leave the ledger unchanged. I/O errors
/// are retryable: the handle commits its in-memory state only after a write
/// succeeds.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger is locked by another writer: {path}")]
    Locked { path: PathBuf },

    #[error("envelope rejected before signing")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("ledger recovery failed at line {line}: {reason}")]
    Recovery { line: usize, reason: String },
}

/// Fatal replay failures.
///
/// Violations found inside a ledger are never errors; they are collected
/// into the [`ReplaySummary`](crate::ReplaySummary). Only conditions that
/// make verification itself meaningless surface here.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported gef_version {found:?}: this verifier implements 1.x")]
    UnsupportedVersion { found: String },
}
