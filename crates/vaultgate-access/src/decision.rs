//! # Access Decision Engine
//!
//! [`evaluate`] is the pure decision function. It has no side effects and
//! takes `now` as an argument; [`AccessDecisionEngine`] wraps it with
//! ledger reads so production callers always decide on fresh records and
//! current ledger time.
//!
//! ## Rules
//!
//! 1. The item's vault must exist, carry the item's `vault_id`, and list
//!    the item. Anything else is a dangling reference and denies.
//! 2. The vault owner is allowed every kind, with or without entries.
//! 3. Otherwise some entry in `vault.allow_list ∪ item.allow_list` must
//!    match the requester and the exact kind, and be active at `now`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vaultgate_core::{AccessKind, Address, EpochMillis, ItemId, VaultId};
use vaultgate_ledger::{load, load_optional, Ledger};

use crate::error::AccessError;
use crate::records::{Item, Vault};

/// Which list an allowing entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryScope {
    /// Vault-level list.
    Vault,
    /// Item-level list.
    Item,
}

/// Why a request was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum AllowBasis {
    /// Requester owns the vault.
    Owner,
    /// An active allow-list entry matched.
    Entry {
        /// List the entry lives on.
        scope: EntryScope,
        /// Its deadline.
        expires_at: EpochMillis,
    },
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    /// No active entry for this address and kind.
    NoMatchingGrant,
    /// The item's vault is missing, mismatched, or does not list it.
    DanglingReference {
        /// Vault the item points at.
        vault: VaultId,
    },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatchingGrant => f.write_str("no matching grant"),
            Self::DanglingReference { vault } => write!(f, "dangling reference to vault {vault}"),
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Access allowed.
    Allow(AllowBasis),
    /// Access denied.
    Deny(DenyReason),
}

impl Decision {
    /// Whether this is an allow.
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Allow(_) => "allow",
            Self::Deny(DenyReason::NoMatchingGrant) => "deny",
            Self::Deny(DenyReason::DanglingReference { .. }) => "dangling",
        }
    }
}

/// Decide whether `requester` may exercise `kind` on `item` at `now`.
///
/// `vault` is the record at `item.vault_id`, or `None` if it does not exist.
pub fn evaluate(
    vault: Option<&Vault>,
    item: &Item,
    requester: &Address,
    kind: AccessKind,
    now: EpochMillis,
) -> Decision {
    let vault = match vault {
        Some(v) if v.id == item.vault_id && v.contains(&item.id) => v,
        _ => {
            tracing::error!(item = %item.id, vault = %item.vault_id, "item references a vault that does not list it");
            return Decision::Deny(DenyReason::DanglingReference {
                vault: item.vault_id,
            });
        }
    };

    if &vault.owner == requester {
        return Decision::Allow(AllowBasis::Owner);
    }

    let scoped = vault
        .allow_list
        .iter()
        .map(|e| (EntryScope::Vault, e))
        .chain(item.allow_list.iter().map(|e| (EntryScope::Item, e)));
    for (scope, entry) in scoped {
        if entry.permits(requester, kind, now) {
            return Decision::Allow(AllowBasis::Entry {
                scope,
                expires_at: entry.expires_at,
            });
        }
    }
    Decision::Deny(DenyReason::NoMatchingGrant)
}

/// A decision together with the records it was made on.
#[derive(Debug, Clone)]
pub struct ResolvedDecision {
    /// The decision.
    pub decision: Decision,
    /// Item as read.
    pub item: Item,
    /// Vault as read, if it exists.
    pub vault: Option<Vault>,
    /// Ledger time used.
    pub now: EpochMillis,
}

/// Ledger-backed decision engine.
#[derive(Clone)]
pub struct AccessDecisionEngine {
    ledger: Arc<dyn Ledger>,
}

impl AccessDecisionEngine {
    /// Create an engine over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Read ledger time, then [`decide_at`](Self::decide_at).
    pub async fn decide(
        &self,
        item_id: ItemId,
        requester: &Address,
        kind: AccessKind,
    ) -> Result<ResolvedDecision, AccessError> {
        let now = self.ledger.now().await?;
        self.decide_at(item_id, requester, kind, now).await
    }

    /// Read the item and its vault, then [`evaluate`] at the given `now`.
    ///
    /// Callers that already checked something else against ledger time
    /// pass that same instant so the whole request is judged at once.
    pub async fn decide_at(
        &self,
        item_id: ItemId,
        requester: &Address,
        kind: AccessKind,
        now: EpochMillis,
    ) -> Result<ResolvedDecision, AccessError> {
        let item: Item = load(self.ledger.as_ref(), item_id).await?;
        let vault = load_optional::<Vault>(self.ledger.as_ref(), item.vault_id).await?;
        let decision = evaluate(vault.as_ref(), &item, requester, kind, now);
        record(&decision);
        if !decision.is_allow() {
            tracing::warn!(item = %item_id, requester = %requester, %kind, ?decision, "access denied");
        }
        Ok(ResolvedDecision {
            decision,
            item,
            vault,
            now,
        })
    }
}

fn record(decision: &Decision) {
    metrics::counter!("vaultgate_decisions_total", "outcome" => decision.outcome()).increment(1);
}
