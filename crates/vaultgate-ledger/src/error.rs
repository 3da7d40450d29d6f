//! # Ledger Error Types

use thiserror::Error;
use vaultgate_core::{FailureKind, ObjectId};

/// Errors raised by ledger reads and transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No live object has this identifier.
    #[error("object {0} not found")]
    NotFound(ObjectId),

    /// The presented authority does not satisfy the object's guard.
    #[error("unauthorized mutation of {object}: {reason}")]
    Unauthorized {
        /// Object whose guard rejected the mutation.
        object: ObjectId,
        /// Which part of the guard check failed.
        reason: String,
    },

    /// The object exists but holds a different record kind.
    #[error("object {object} has kind {found}, expected {expected}")]
    KindMismatch {
        /// Object that was read.
        object: ObjectId,
        /// Kind the caller asked for.
        expected: String,
        /// Kind actually stored.
        found: String,
    },

    /// The stored fields do not decode into the record type for their kind.
    #[error("object {object} is malformed: {reason}")]
    Malformed {
        /// Object that failed to decode.
        object: ObjectId,
        /// Decoder diagnostic.
        reason: String,
    },

    /// A create targeted an identifier that is already live.
    #[error("object {0} already exists")]
    AlreadyExists(ObjectId),

    /// A staged precondition rejected the transaction.
    #[error("transaction aborted at {object}: {reason}")]
    Aborted {
        /// Object whose precondition failed.
        object: ObjectId,
        /// Failure category the precondition reported.
        kind: FailureKind,
        /// Human-readable reason.
        reason: String,
    },

    /// A record could not be encoded into ledger fields.
    #[error("record encoding failed: {0}")]
    Encode(String),

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Unauthorized { .. } => FailureKind::Unauthorized,
            Self::KindMismatch { .. } | Self::Malformed { .. } => FailureKind::DanglingReference,
            Self::Aborted { kind, .. } => *kind,
            Self::AlreadyExists(_) | Self::Encode(_) => FailureKind::Internal,
            Self::Unavailable(_) => FailureKind::NetworkError,
        }
    }
}
