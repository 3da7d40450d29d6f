//! # Allow-List Manager
//!
//! Mutates the per-address access lists of vaults and items. Every
//! mutation is staged on a ledger transaction under the vault capability,
//! so the ledger's guard check and atomic commit apply.
//!
//! Identical `(address, kind)` pairs from the same source are merged by
//! extending the deadline to the later of the two. Entries inserted by an
//! OAuth grant carry its id and never merge with entries of another
//! source, so revoking the grant removes exactly its own contribution.
//! Entries for different kinds stay separate: kinds form a flat enum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vaultgate_core::{AccessKind, Address, EpochMillis, ItemId, VaultId};
use vaultgate_ledger::{load, Authority, Ledger, Transaction};

use crate::error::{wrong_target, AccessError};
use crate::records::{AccessEntry, Item, Vault, VaultCapability};

/// Which allow-list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// The vault-level list; covers every item in the vault.
    Vault,
    /// The list of a single item in the vault.
    Item(ItemId),
}

/// Insert `entry`, extending an existing identical `(address, kind)` pair
/// of the same source instead of duplicating it. Returns `true` if an
/// entry was merged.
pub fn merge_entry(list: &mut Vec<AccessEntry>, entry: AccessEntry) -> bool {
    match list.iter_mut().find(|e| {
        e.address == entry.address && e.access_kind == entry.access_kind && e.grant_id == entry.grant_id
    }) {
        Some(existing) => {
            existing.expires_at = existing.expires_at.max(entry.expires_at);
            true
        }
        None => {
            list.push(entry);
            false
        }
    }
}

/// Remove every entry for `(address, kind)`. Returns how many were removed.
pub fn remove_entries(list: &mut Vec<AccessEntry>, address: &Address, kind: AccessKind) -> usize {
    let before = list.len();
    list.retain(|e| !(&e.address == address && e.access_kind == kind));
    before - list.len()
}

/// Remove entries that are no longer active at `now`.
pub fn compact_entries(list: &mut Vec<AccessEntry>, now: EpochMillis) -> usize {
    let before = list.len();
    list.retain(|e| e.is_active(now));
    before - list.len()
}

/// Allow-list operations over the ledger.
#[derive(Clone)]
pub struct AllowListManager {
    ledger: Arc<dyn Ledger>,
}

impl AllowListManager {
    /// Create a manager over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Add `entry` to the allow-list in `scope`.
    ///
    /// # Errors
    ///
    /// - [`AccessError::Unauthorized`] if `cap` does not govern `vault_id`
    ///   or is not held by `caller`.
    /// - [`AccessError::InvalidExpiry`] if the entry's deadline is not strictly
    ///   after current ledger time.
    pub async fn grant_access(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
        scope: AccessScope,
        entry: AccessEntry,
    ) -> Result<(), AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let now = self.ledger.now().await?;
        if entry.expires_at <= now {
            return Err(AccessError::InvalidExpiry {
                expires_at: entry.expires_at,
                now,
            });
        }
        tracing::info!(
            vault = %vault_id,
            ?scope,
            grantee = %entry.address,
            kind = %entry.access_kind,
            expires_at = %entry.expires_at,
            "granting access"
        );

        let authority = Authority::Capability(cap.id.object_id());
        let mut tx = Transaction::new(caller.clone());
        match scope {
            AccessScope::Vault => {
                tx.update::<Vault, _>(vault_id, authority, move |vault| {
                    merge_entry(&mut vault.allow_list, entry);
                    Ok(())
                });
            }
            AccessScope::Item(item_id) => {
                tx.update::<Item, _>(item_id, authority, move |item| {
                    ensure_item_in(item, vault_id)?;
                    merge_entry(&mut item.allow_list, entry);
                    Ok(())
                });
            }
        }
        self.ledger.execute(tx).await?;
        Ok(())
    }

    /// Remove every entry for `(address, kind)` in the given scope.
    ///
    /// Returns how many entries were removed; revoking an absent entry is
    /// not an error. Issued grants are not touched: they are checked
    /// against the live allow-list at access time.
    pub async fn revoke_access(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
        scope: AccessScope,
        address: &Address,
        kind: AccessKind,
    ) -> Result<usize, AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        let grantee = address.clone();
        let authority = Authority::Capability(cap.id.object_id());

        let mut tx = Transaction::new(caller.clone());
        match scope {
            AccessScope::Vault => {
                tx.update::<Vault, _>(vault_id, authority, move |vault| {
                    counter.store(remove_entries(&mut vault.allow_list, &grantee, kind), Ordering::SeqCst);
                    Ok(())
                });
            }
            AccessScope::Item(item_id) => {
                tx.update::<Item, _>(item_id, authority, move |item| {
                    ensure_item_in(item, vault_id)?;
                    counter.store(remove_entries(&mut item.allow_list, &grantee, kind), Ordering::SeqCst);
                    Ok(())
                });
            }
        }
        self.ledger.execute(tx).await?;
        let removed = removed.load(Ordering::SeqCst);
        tracing::info!(vault = %vault_id, ?scope, grantee = %address, %kind, removed, "revoked access");
        Ok(removed)
    }

    /// Drop expired entries from the vault and every item it lists.
    ///
    /// Idempotent and never changes a decision: expired entries already
    /// fail every check.
    pub async fn compact_allow_list(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
    ) -> Result<usize, AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let vault: Vault = load(self.ledger.as_ref(), vault_id).await?;
        let now = self.ledger.now().await?;
        let removed = Arc::new(AtomicUsize::new(0));
        let authority = Authority::Capability(cap.id.object_id());

        let mut tx = Transaction::new(caller.clone());
        let counter = Arc::clone(&removed);
        tx.update::<Vault, _>(vault_id, authority, move |vault| {
            counter.fetch_add(compact_entries(&mut vault.allow_list, now), Ordering::SeqCst);
            Ok(())
        });
        for item_id in vault.items {
            let counter = Arc::clone(&removed);
            tx.update::<Item, _>(item_id, authority, move |item| {
                counter.fetch_add(compact_entries(&mut item.allow_list, now), Ordering::SeqCst);
                Ok(())
            });
        }
        self.ledger.execute(tx).await?;
        let removed = removed.load(Ordering::SeqCst);
        tracing::debug!(vault = %vault_id, removed, "compacted allow-lists");
        Ok(removed)
    }
}

fn ensure_item_in(item: &Item, vault_id: VaultId) -> Result<(), vaultgate_ledger::Abort> {
    if item.vault_id == vault_id {
        Ok(())
    } else {
        Err(vaultgate_ledger::Abort::new(
            vaultgate_core::FailureKind::Unauthorized,
            format!("item {} belongs to vault {}", item.id, item.vault_id),
        ))
    }
}
