//! # Gate Error Types
//!
//! Local failures (credential, decision, integrity) are fatal for the
//! request. External failures are classified at the call site so the
//! caller can tell "not allowed" from "try again later".

use std::time::Duration;

use thiserror::Error;
use vaultgate_access::{AccessError, DenyReason};
use vaultgate_core::{FailureKind, ItemId, VaultId};
use vaultgate_ledger::LedgerError;

use crate::blob::BlobError;
use crate::oracle::OracleError;

/// Errors from the decryption gate, session credentials and publishing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Credential expired, mis-signed, malformed, or bound elsewhere.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The access decision engine denied the request.
    #[error("access denied: {0}")]
    AccessDenied(DenyReason),

    /// The item's vault is missing or does not list the item.
    #[error("item {item} references vault {vault}, which does not list it")]
    DanglingReference {
        /// Offending item.
        item: ItemId,
        /// Vault it points at.
        vault: VaultId,
    },

    /// The request named a different vault from the item's own.
    #[error("item {item} belongs to vault {actual}, not {requested}")]
    VaultMismatch {
        /// Requested item.
        item: ItemId,
        /// Vault named in the request.
        requested: VaultId,
        /// Vault the item belongs to.
        actual: VaultId,
    },

    /// A blob does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which external call.
        operation: &'static str,
        /// Configured deadline.
        after: Duration,
    },

    /// An external collaborator could not be reached or lacked replicas.
    #[error("network error: {0}")]
    Network(String),

    /// The decrypt oracle could not gather enough key shares.
    #[error("insufficient key shares: {0}")]
    InsufficientShares(String),

    /// The decrypt oracle rejected the authorization artifact.
    #[error("invalid decryption artifact: {0}")]
    InvalidArtifact(String),

    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Access control plane failure.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidCredential(_) => FailureKind::InvalidCredential,
            Self::AccessDenied(_) => FailureKind::AccessDenied,
            Self::DanglingReference { .. } => FailureKind::DanglingReference,
            Self::VaultMismatch { .. } | Self::Validation(_) => FailureKind::Validation,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Network(_) => FailureKind::NetworkError,
            Self::InsufficientShares(_) => FailureKind::InsufficientShares,
            Self::InvalidArtifact(_) => FailureKind::InvalidArtifact,
            Self::Access(e) => e.kind(),
            Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Whether the caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Remediation hint for the user, if the failure has one.
    pub fn remediation(&self) -> Option<&'static str> {
        self.kind().remediation()
    }
}

impl From<LedgerError> for GateError {
    fn from(err: LedgerError) -> Self {
        Self::Access(AccessError::Ledger(err))
    }
}

impl From<BlobError> for GateError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(id) => Self::NotFound(format!("blob {id}")),
            BlobError::NotEnoughReplicas(id) => {
                Self::Network(format!("not enough replicas available for blob {id}"))
            }
            BlobError::Network(msg) => Self::Network(msg),
        }
    }
}

impl From<OracleError> for GateError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::InsufficientShares { responded, threshold } => Self::InsufficientShares(format!(
                "{responded} of {threshold} required key servers responded"
            )),
            OracleError::InvalidArtifact(msg) => Self::InvalidArtifact(msg),
            OracleError::InvalidCiphertext(msg) => Self::Validation(format!("ciphertext: {msg}")),
            OracleError::Network(msg) => Self::Network(msg),
        }
    }
}

impl From<vaultgate_crypto::CryptoError> for GateError {
    fn from(err: vaultgate_crypto::CryptoError) -> Self {
        match err.kind() {
            FailureKind::Internal => Self::Internal(err.to_string()),
            _ => Self::InvalidCredential(err.to_string()),
        }
    }
}

impl From<vaultgate_core::CanonicalizationError> for GateError {
    fn from(err: vaultgate_core::CanonicalizationError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_is_distinct_from_transport_failure() {
        let denied = GateError::AccessDenied(DenyReason::NoMatchingGrant);
        let timeout = GateError::Timeout {
            operation: "blob read",
            after: Duration::from_secs(300),
        };
        assert_eq!(denied.kind(), FailureKind::AccessDenied);
        assert!(!denied.is_retryable());
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert!(timeout.is_retryable());
        assert!(timeout.remediation().is_some());
    }

    #[test]
    fn oracle_errors_classify() {
        let shares: GateError = OracleError::InsufficientShares {
            responded: 1,
            threshold: 2,
        }
        .into();
        assert!(shares.is_retryable());
        assert!(shares.to_string().contains("1 of 2"));
        let artifact: GateError = OracleError::InvalidArtifact("bad sig".into()).into();
        assert!(!artifact.is_retryable());
    }

    #[test]
    fn missing_replicas_are_retryable_network_errors() {
        let err: GateError = BlobError::NotEnoughReplicas("b1".into()).into();
        assert_eq!(err.kind(), FailureKind::NetworkError);
        let err: GateError = BlobError::NotFound("b1".into()).into();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }
}
