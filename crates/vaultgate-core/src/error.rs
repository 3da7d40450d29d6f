//! # Error Hierarchy
//!
//! Structured error types shared across vaultgate, built with `thiserror`.
//!
//! Each crate defines its own error enum carrying diagnostic context (the
//! object, the address, the deadline) and maps it onto [`FailureKind`],
//! the workspace-wide taxonomy. Callers branch on the kind; operators read
//! the message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-checkable failure category.
///
/// Every error surfaced by the workspace maps to exactly one kind. The kind
/// decides retry policy and HTTP status; the error's `Display` carries the
/// human-readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Capability or ownership mismatch on a mutation.
    Unauthorized,
    /// Expiry not strictly in the future.
    InvalidExpiry,
    /// Grant issuance referenced a vault the owner cannot mutate.
    NoCapabilityForVault,
    /// The access decision engine returned DENY.
    AccessDenied,
    /// Expired or improperly signed session credential.
    InvalidCredential,
    /// A record references an object that does not exist.
    DanglingReference,
    /// An external collaborator was unreachable.
    NetworkError,
    /// An external collaborator did not answer in time.
    Timeout,
    /// The decrypt oracle could not gather enough key shares.
    InsufficientShares,
    /// Attempted deletion of a vault that still holds items.
    VaultNotEmpty,
    /// The requested object does not exist.
    NotFound,
    /// Input failed validation.
    Validation,
    /// The decrypt oracle rejected the authorization artifact.
    InvalidArtifact,
    /// Unexpected internal failure.
    Internal,
}

impl FailureKind {
    /// SCREAMING_SNAKE_CASE code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidExpiry => "INVALID_EXPIRY",
            Self::NoCapabilityForVault => "NO_CAPABILITY_FOR_VAULT",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::DanglingReference => "DANGLING_REFERENCE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::InsufficientShares => "INSUFFICIENT_SHARES",
            Self::VaultNotEmpty => "VAULT_NOT_EMPTY",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::InvalidArtifact => "INVALID_ARTIFACT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may retry the failed operation unchanged.
    ///
    /// Only transport-level failures and share shortfalls are retryable.
    /// Validation, authorization and integrity failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::InsufficientShares
        )
    }

    /// Remediation hint for user-facing failures with partial-failure modes.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::NetworkError => Some(
                "check network connectivity, firewall rules, and DNS resolution for the storage and key-server endpoints",
            ),
            Self::Timeout => Some(
                "the storage or key-server network is slow to respond; check network/firewall/DNS and retry later",
            ),
            Self::InsufficientShares => Some(
                "data temporarily unavailable: not enough key servers responded; retry later",
            ),
            Self::InvalidCredential => {
                Some("re-establish a session credential by signing a new challenge")
            }
            Self::VaultNotEmpty => Some("delete every item in the vault before deleting the vault"),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl CanonicalizationError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        FailureKind::Internal
    }
}

/// Validation errors for domain primitive newtypes and operation inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Address does not match `0x` followed by 1-64 alphanumeric characters.
    #[error("invalid address: \"{0}\" (expected 0x followed by 1-64 alphanumeric characters)")]
    InvalidAddress(String),

    /// Unknown access kind discriminant.
    #[error("invalid access kind: {0} (expected 0=View, 1=Edit, 2=Delete)")]
    InvalidAccessKind(u8),

    /// Identifier string is not a valid UUID.
    #[error("invalid identifier: \"{0}\"")]
    InvalidIdentifier(String),

    /// A required string field was empty.
    #[error("{field} must be non-empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// Any other malformed input.
    #[error("invalid {field}: {reason}")]
    Malformed {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        FailureKind::Validation
    }
}
