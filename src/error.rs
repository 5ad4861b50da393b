//! Crate-level error types for appending, validating and reading cases.

use serde::{Deserialize, Serialize};

use crate::event::CaseId;

/// A business rule rejected a candidate event.
///
/// Terminal for that submission. `reason` is meant to be shown to the end
/// user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("rule `{rule}` rejected the event: {reason}")]
pub struct ValidationError {
    /// Stable rule name, e.g. `"missing_reference"`.
    pub rule: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned by an [`EventStore`](crate::EventStore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller's expected version is stale (or ahead).
    ///
    /// Nothing was written. The caller should re-read and retry.
    #[error("version conflict on case {case_id}: expected {expected}, actual {actual}")]
    ConcurrencyConflict {
        case_id: CaseId,
        expected: u64,
        actual: u64,
    },

    /// A non-creating event was appended to a case with no log.
    #[error("case {0} does not exist")]
    UnknownCase(CaseId),

    /// An event in the batch names a different case than the log it was
    /// appended to.
    #[error("event for case {found} cannot be appended to case {expected}")]
    CaseMismatch { expected: CaseId, found: CaseId },

    /// Another process held the case lock for longer than the lock timeout.
    #[error("case log is locked by another writer: {path}")]
    LockBusy { path: String },

    /// Disk I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded or breaks log continuity.
    #[error("corrupt event log {path} at line {line}: {message}")]
    Corrupt {
        path: String,
        line: usize,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned by [`CaseService`](crate::CaseService) operations.
///
/// Exactly three kinds: a recoverable conflict, a terminal rule violation,
/// and a fatal storage failure.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// Re-read the case and retry against the new version.
    #[error("concurrency conflict: case is at version {actual_version}")]
    ConcurrencyConflict { actual_version: u64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The log could not be read or durably written. Nothing may be
    /// assumed about partial application of the attempted write.
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl CaseError {
    /// The name of the violated rule, for validation errors.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Validation(e) => Some(&e.rule),
            Self::ConcurrencyConflict { .. } | Self::Storage(_) => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl From<StoreError> for CaseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict { actual, .. } => Self::ConcurrencyConflict {
                actual_version: actual,
            },
            StoreError::UnknownCase(case_id) => Self::Validation(ValidationError::new(
                "unknown_case",
                format!("case {case_id} does not exist"),
            )),
            StoreError::CaseMismatch { expected, found } => Self::Validation(
                ValidationError::new(
                    "case_id_mismatch",
                    format!("event for case {found} cannot be submitted to case {expected}"),
                ),
            ),
            other => Self::Storage(other),
        }
    }
}

/// Error loading a [`RulePolicy`](crate::RulePolicy).
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("I/O error reading policy: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid policy document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure reported by a [`Reactor`](crate::Reactor).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ReactorError(pub String);

impl ReactorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
