//! # Cryptographic Error Types

use thiserror::Error;
use vaultgate_core::FailureKind;

/// Errors from cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// Public key bytes are not a valid Ed25519 point.
    #[error("invalid Ed25519 public key: {0}")]
    InvalidPublicKey(String),

    /// Private key seed is malformed.
    #[error("invalid Ed25519 signing key: {0}")]
    InvalidSigningKey(String),

    /// Signature has the wrong encoding or length.
    #[error("invalid Ed25519 signature: {0}")]
    InvalidSignature(String),

    /// Bearer token is not 64 hex characters.
    #[error("invalid bearer token encoding")]
    InvalidToken,

    /// Canonicalization of the signed payload failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
}

impl CryptoError {
    /// Failure category for this error.
    ///
    /// Any signature or key problem on a presented credential is an
    /// invalid credential; canonicalization failures are internal.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Canonicalization(_) => FailureKind::Internal,
            Self::InvalidToken => FailureKind::Validation,
            _ => FailureKind::InvalidCredential,
        }
    }
}

impl From<vaultgate_core::CanonicalizationError> for CryptoError {
    fn from(err: vaultgate_core::CanonicalizationError) -> Self {
        Self::Canonicalization(err.to_string())
    }
}
