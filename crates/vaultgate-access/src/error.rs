//! # Access Control Error Types

use thiserror::Error;
use vaultgate_core::{AccessKind, EpochMillis, FailureKind, ItemId, ValidationError, VaultId};
use vaultgate_ledger::LedgerError;

/// Errors from the vault registry, allow-list manager, service registry
/// and grant issuer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The presented capability does not govern the targeted record, or
    /// the caller does not hold it.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Expiry is not strictly after current ledger time.
    #[error("expiry {expires_at} is not after ledger time {now}")]
    InvalidExpiry {
        /// Requested deadline.
        expires_at: EpochMillis,
        /// Ledger time at validation.
        now: EpochMillis,
    },

    /// Grant issuance referenced a vault the owner holds no capability for.
    #[error("no capability held for vault {0}")]
    NoCapabilityForVault(VaultId),

    /// Vault deletion attempted while items remain.
    #[error("vault {vault} still holds {items} item(s)")]
    VaultNotEmpty {
        /// Vault targeted for deletion.
        vault: VaultId,
        /// Remaining item count.
        items: usize,
    },

    /// An item's vault is missing or does not list the item.
    #[error("item {item} references vault {vault}, which does not list it")]
    DanglingReference {
        /// Offending item.
        item: ItemId,
        /// Vault it points at.
        vault: VaultId,
    },

    /// An item's kind is outside what the service declared.
    #[error("service {client_id} did not request {kind} access")]
    KindNotDeclared {
        /// Client id of the service.
        client_id: String,
        /// Undeclared kind.
        kind: AccessKind,
    },

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Ledger read or transaction failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AccessError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized(_) => FailureKind::Unauthorized,
            Self::InvalidExpiry { .. } => FailureKind::InvalidExpiry,
            Self::NoCapabilityForVault(_) => FailureKind::NoCapabilityForVault,
            Self::VaultNotEmpty { .. } => FailureKind::VaultNotEmpty,
            Self::DanglingReference { .. } => FailureKind::DanglingReference,
            Self::KindNotDeclared { .. } | Self::Validation(_) => FailureKind::Validation,
            Self::Ledger(e) => e.kind(),
        }
    }
}

/// Reject a capability presented for the wrong target before staging.
pub(crate) fn wrong_target(what: &str, presented: impl std::fmt::Display, target: impl std::fmt::Display) -> AccessError {
    tracing::warn!(%presented, %target, "{what} capability presented for a different target");
    AccessError::Unauthorized(format!(
        "{what} capability {presented} does not govern {target}"
    ))
}
