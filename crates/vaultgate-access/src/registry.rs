//! # Vault Registry
//!
//! Vault and item lifecycle. A vault and its capability are minted in one
//! transaction; the capability is returned to the creator and is the only
//! authority for every later mutation of the vault or its items.

use std::sync::Arc;

use vaultgate_core::{AccessKind, Address, BlobId, FailureKind, ItemId, ValidationError, VaultId};
use vaultgate_ledger::{load, Abort, Authority, Guard, Ledger, LedgerRecord, Transaction};

use crate::error::{wrong_target, AccessError};
use crate::records::{Item, Vault, VaultCapability};

/// Maximum length of a vault's group name or an item's name.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum nonce length in bytes.
pub const MAX_NONCE_LEN: usize = 64;

/// Inputs for a new item.
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Display name.
    pub name: String,
    /// Kind the item is shared under.
    pub access_kind: AccessKind,
    /// Blob holding the ciphertext.
    pub ciphertext_ref: BlobId,
    /// Nonce for identity derivation.
    pub nonce: Vec<u8>,
}

/// Vault and item operations over the ledger.
#[derive(Clone)]
pub struct VaultRegistry {
    ledger: Arc<dyn Ledger>,
}

impl VaultRegistry {
    /// Create a registry over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Create a vault owned by `owner` and mint its capability.
    pub async fn create_vault(
        &self,
        owner: &Address,
        group_name: &str,
    ) -> Result<(Vault, VaultCapability), AccessError> {
        let group_name = validate_name("group_name", group_name)?;
        let vault = Vault {
            id: VaultId::new(),
            owner: owner.clone(),
            group_name,
            items: Vec::new(),
            allow_list: Vec::new(),
        };
        let cap = VaultCapability::mint(vault.id);

        let mut tx = Transaction::new(owner.clone());
        tx.create(&cap, Guard::Holder(owner.clone()))?;
        tx.create(&vault, Guard::Capability(cap.id.object_id()))?;
        self.ledger.execute(tx).await?;

        tracing::info!(vault = %vault.id, owner = %owner, "vault created");
        Ok((vault, cap))
    }

    /// Register a new item in `vault_id`.
    ///
    /// # Errors
    ///
    /// [`AccessError::Unauthorized`] if `cap` does not govern `vault_id`.
    pub async fn create_item(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
        new_item: NewItem,
    ) -> Result<Item, AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let name = validate_name("name", &new_item.name)?;
        if new_item.nonce.is_empty() {
            return Err(ValidationError::EmptyField { field: "nonce" }.into());
        }
        if new_item.nonce.len() > MAX_NONCE_LEN {
            return Err(ValidationError::TooLong {
                field: "nonce",
                max: MAX_NONCE_LEN,
            }
            .into());
        }
        let item = Item {
            id: ItemId::new(),
            vault_id,
            name,
            access_kind: new_item.access_kind,
            ciphertext_ref: new_item.ciphertext_ref,
            nonce: new_item.nonce,
            allow_list: Vec::new(),
        };
        let authority = Authority::Capability(cap.id.object_id());
        let item_id = item.id;

        let mut tx = Transaction::new(caller.clone());
        tx.update::<Vault, _>(vault_id, authority, move |vault| {
            if !vault.items.contains(&item_id) {
                vault.items.push(item_id);
            }
            Ok(())
        });
        tx.create(&item, Guard::Capability(cap.id.object_id()))?;
        self.ledger.execute(tx).await?;

        tracing::info!(vault = %vault_id, item = %item.id, kind = %item.access_kind, "item created");
        Ok(item)
    }

    /// Point an item at new ciphertext. Nonce and access kind are fixed.
    pub async fn update_item(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
        item_id: ItemId,
        ciphertext_ref: BlobId,
    ) -> Result<(), AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let mut tx = Transaction::new(caller.clone());
        tx.update::<Item, _>(item_id, Authority::Capability(cap.id.object_id()), move |item| {
            if item.vault_id != vault_id {
                return Err(Abort::new(
                    FailureKind::Unauthorized,
                    format!("item belongs to vault {}", item.vault_id),
                ));
            }
            item.ciphertext_ref = ciphertext_ref;
            Ok(())
        });
        self.ledger.execute(tx).await?;
        tracing::info!(vault = %vault_id, item = %item_id, "item ciphertext replaced");
        Ok(())
    }

    /// Remove an item from its vault and delete it.
    pub async fn delete_item(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
        item_id: ItemId,
    ) -> Result<(), AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let authority = Authority::Capability(cap.id.object_id());
        let mut tx = Transaction::new(caller.clone());
        tx.update::<Vault, _>(vault_id, authority, move |vault| {
            vault.items.retain(|id| *id != item_id);
            Ok(())
        });
        tx.delete_if::<Item, _>(item_id, authority, move |item| {
            if item.vault_id == vault_id {
                Ok(())
            } else {
                Err(Abort::new(
                    FailureKind::Unauthorized,
                    format!("item belongs to vault {}", item.vault_id),
                ))
            }
        });
        self.ledger.execute(tx).await?;
        tracing::info!(vault = %vault_id, item = %item_id, "item deleted");
        Ok(())
    }

    /// Delete an empty vault and burn its capability.
    ///
    /// # Errors
    ///
    /// [`AccessError::VaultNotEmpty`] while the vault lists any item.
    pub async fn delete_vault(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
    ) -> Result<(), AccessError> {
        if !cap.governs(&vault_id) {
            return Err(wrong_target("vault", cap.id, vault_id));
        }
        let vault: Vault = load(self.ledger.as_ref(), vault_id).await?;
        if !vault.items.is_empty() {
            return Err(AccessError::VaultNotEmpty {
                vault: vault_id,
                items: vault.items.len(),
            });
        }

        let mut tx = Transaction::new(caller.clone());
        tx.delete_if::<Vault, _>(vault_id, Authority::Capability(cap.id.object_id()), |vault| {
            if vault.items.is_empty() {
                Ok(())
            } else {
                Err(Abort::new(
                    FailureKind::VaultNotEmpty,
                    format!("{} item(s) remain", vault.items.len()),
                ))
            }
        });
        tx.delete::<VaultCapability>(cap.id, Authority::Sender);
        self.ledger.execute(tx).await?;
        tracing::info!(vault = %vault_id, "vault deleted and capability burned");
        Ok(())
    }

    /// Hand the vault capability to another address.
    ///
    /// Mutation rights move with the capability. The vault's `owner` field
    /// does not change, so the creator keeps the ownership bypass.
    pub async fn transfer_vault_capability(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        new_holder: &Address,
    ) -> Result<(), AccessError> {
        let mut tx = Transaction::new(caller.clone());
        tx.transfer(cap.id, new_holder.clone());
        self.ledger.execute(tx).await?;
        tracing::info!(vault = %cap.target, from = %caller, to = %new_holder, "vault capability transferred");
        Ok(())
    }

    /// Read a vault.
    pub async fn get_vault(&self, vault_id: VaultId) -> Result<Vault, AccessError> {
        Ok(load(self.ledger.as_ref(), vault_id).await?)
    }

    /// Read an item.
    pub async fn get_item(&self, item_id: ItemId) -> Result<Item, AccessError> {
        Ok(load(self.ledger.as_ref(), item_id).await?)
    }

    /// Items of a vault in insertion order, fetched concurrently.
    pub async fn list_items(&self, vault_id: VaultId) -> Result<Vec<Item>, AccessError> {
        let vault = self.get_vault(vault_id).await?;
        futures::future::try_join_all(vault.items.iter().map(|id| self.get_item(*id))).await
    }

    /// Vault capabilities held by `holder`.
    pub async fn owned_vault_capabilities(
        &self,
        holder: &Address,
    ) -> Result<Vec<VaultCapability>, AccessError> {
        let objects = self
            .ledger
            .owned_objects(holder, <VaultCapability as LedgerRecord>::KIND)
            .await?;
        objects
            .iter()
            .map(|o| o.decode::<VaultCapability>().map_err(AccessError::from))
            .collect()
    }
}

pub(crate) fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LEN,
        });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("name", "  V1 ").unwrap(), "V1");
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
