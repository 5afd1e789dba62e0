//! Error types for GuardClaw core operations.

use thiserror::Error;

/// Core errors that can occur while building, encoding, or signing envelopes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("canonicalization failed: {0}")]
    Serialization(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid base64url signature: {0}")]
    InvalidSignatureEncoding(String),

    #[error("envelope failed schema validation")]
    Schema(#[from] SchemaError),
}

/// One typed reason an envelope failed schema validation.
///
/// Validation reports every issue it finds, not just the first, so the
/// replay engine can surface precise diagnostics per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// The envelope field at fault, or `"envelope"` for structural issues.
    pub field: String,
    /// Human-readable description of the constraint that failed.
    pub detail: String,
}

impl SchemaIssue {
    pub fn new(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

/// Schema validation failure: the full list of issues found.
#[derive(Debug, Clone, Error)]
#[error("schema validation failed: {}", format_issues(.issues))]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
    pub fn new(issues: Vec<SchemaIssue>) -> Self {
        Self { issues }
    }
}

fn format_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
