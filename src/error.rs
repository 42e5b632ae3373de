//! Error types for railcheck.
//!
//! Validation itself never fails: missing slots are `None`, and loader or
//! checker faults degrade at the boundary where they are logged. These types
//! describe those boundary faults.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reference data error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Override rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Spell checker error: {0}")]
    Spell(#[from] SpellError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Some reference sources failed to reload; the others were swapped in.
    #[error(
        "Reload incomplete: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Reload(Vec<Error>),
}

/// Contingency table and line configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Contingency table has no {column} column")]
    MissingColumn { column: &'static str },

    #[error("Contingency row {row} is malformed: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// Curator-authored override rule errors.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Failed to read rule collection {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule collection {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Rule {id} has an invalid regex: {source}")]
    InvalidRegex {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule {id} has no regex")]
    MissingRegex { id: String },

    #[error("Rule {id} has unknown action '{action}'")]
    UnknownAction { id: String, action: String },
}

/// External spell-checker errors.
#[derive(Debug, thiserror::Error)]
pub enum SpellError {
    #[error("Spell checker {checker} unavailable: {reason}")]
    Unavailable { checker: String, reason: String },

    #[error("Spell checker {checker} timed out after {timeout:?}")]
    Timeout { checker: String, timeout: Duration },

    #[error("Spell checker {checker} request failed: {reason}")]
    RequestFailed { checker: String, reason: String },

    #[error("Invalid response from spell checker {checker}: {reason}")]
    InvalidResponse { checker: String, reason: String },
}

/// Batch driver errors.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Message source {source_name} failed: {reason}")]
    SourceFailed { source_name: String, reason: String },

    #[error("Validation worker for message {id} failed: {reason}")]
    WorkerFailed { id: String, reason: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
