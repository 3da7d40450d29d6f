//! # Data Publishing
//!
//! The owner-side write path: encrypt to the item's identity through the
//! oracle, store the ciphertext, wait until it is readable, then register
//! or update the item on the ledger. Nothing is registered until the blob
//! is confirmed readable.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use vaultgate_access::{AccessError, Item, NewItem, VaultCapability, VaultRegistry};
use vaultgate_core::{AccessKind, Address, BlobId, FailureKind, ItemId, VaultId};
use vaultgate_ledger::Ledger;
use zeroize::Zeroizing;

use crate::blob::{BlobStore, Retention};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::gate::bounded;
use crate::identity::{identity_strategy, EncryptionIdentity, IdentityStrategy};
use crate::oracle::DecryptOracle;
use crate::retry::{with_retry, RetryPolicy, Retryable};

/// Random nonce length for new items.
pub const NONCE_BYTES: usize = 16;

/// A published item and the key the owner keeps for offline recovery.
pub struct Publication {
    /// The registered or updated item.
    pub item: Item,
    /// Symmetric backup key returned by the oracle.
    pub backup_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("item", &self.item.id)
            .field("ciphertext_ref", &self.item.ciphertext_ref)
            .field("backup_key", &"[REDACTED]")
            .finish()
    }
}

/// Freshly written blobs may be invisible for a moment; treat that as
/// transient while confirming the write.
struct ReadAfterWrite(GateError);

impl Retryable for ReadAfterWrite {
    fn is_retryable(&self) -> bool {
        self.0.kind() == FailureKind::NotFound || self.0.is_retryable()
    }
}

impl std::fmt::Display for ReadAfterWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Encrypts, stores and registers item contents.
#[derive(Clone)]
pub struct DataPublisher {
    registry: VaultRegistry,
    blobs: Arc<dyn BlobStore>,
    oracle: Arc<dyn DecryptOracle>,
    identity: Arc<dyn IdentityStrategy>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl DataPublisher {
    /// Assemble a publisher sharing the gate's configuration.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        blobs: Arc<dyn BlobStore>,
        oracle: Arc<dyn DecryptOracle>,
        config: &GateConfig,
    ) -> Self {
        Self {
            registry: VaultRegistry::new(ledger),
            blobs,
            oracle,
            identity: identity_strategy(&config.identity_mode),
            retry: config.retry,
            timeout: config.external_timeout,
        }
    }

    /// Replace the identity strategy.
    pub fn with_identity_strategy(mut self, identity: Arc<dyn IdentityStrategy>) -> Self {
        self.identity = identity;
        self
    }

    /// Encrypt `plaintext` under a fresh nonce and register it as a new
    /// item of `vault_id`.
    #[allow(clippy::too_many_arguments)]
    pub async fn publish(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        vault_id: VaultId,
        name: impl Into<String>,
        access_kind: AccessKind,
        plaintext: &[u8],
        retention: Retention,
    ) -> Result<Publication, GateError> {
        if !cap.governs(&vault_id) {
            return Err(AccessError::Unauthorized(format!(
                "capability {} does not govern vault {vault_id}",
                cap.id
            ))
            .into());
        }
        let mut nonce = vec![0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let identity = self.identity.derive(vault_id, &nonce);
        let (ciphertext_ref, backup_key) = self.seal_and_store(&identity, plaintext, retention).await?;

        let item = self
            .registry
            .create_item(
                caller,
                cap,
                vault_id,
                NewItem {
                    name: name.into(),
                    access_kind,
                    ciphertext_ref,
                    nonce,
                },
            )
            .await?;
        Ok(Publication { item, backup_key })
    }

    /// Re-encrypt new contents under the item's existing identity and
    /// point the item at them.
    pub async fn republish(
        &self,
        caller: &Address,
        cap: &VaultCapability,
        item_id: ItemId,
        plaintext: &[u8],
        retention: Retention,
    ) -> Result<Publication, GateError> {
        let mut item = self.registry.get_item(item_id).await?;
        if !cap.governs(&item.vault_id) {
            return Err(AccessError::Unauthorized(format!(
                "capability {} does not govern vault {}",
                cap.id, item.vault_id
            ))
            .into());
        }
        let identity = self.identity.derive(item.vault_id, &item.nonce);
        let (ciphertext_ref, backup_key) = self.seal_and_store(&identity, plaintext, retention).await?;
        self.registry
            .update_item(caller, cap, item.vault_id, item.id, ciphertext_ref.clone())
            .await?;
        item.ciphertext_ref = ciphertext_ref;
        Ok(Publication { item, backup_key })
    }

    async fn seal_and_store(
        &self,
        identity: &EncryptionIdentity,
        plaintext: &[u8],
        retention: Retention,
    ) -> Result<(BlobId, Zeroizing<Vec<u8>>), GateError> {
        let sealed = bounded("oracle encrypt", self.timeout, self.oracle.encrypt(identity, plaintext)).await?;
        let ciphertext = sealed.ciphertext;

        let blobs = self.blobs.as_ref();
        let timeout = self.timeout;
        let payload = &ciphertext;
        let blob_id = with_retry(&self.retry, || {}, move || async move {
            bounded("blob write", timeout, blobs.write(payload.clone(), retention)).await
        })
        .await?;

        let written = &blob_id;
        with_retry(&self.retry, || {}, move || async move {
            bounded("blob read", timeout, blobs.read(written))
                .await
                .map(|_| ())
                .map_err(ReadAfterWrite)
        })
        .await
        .map_err(|ReadAfterWrite(e)| e)?;

        tracing::info!(blob = %blob_id, identity = %identity, size = ciphertext.len(), "ciphertext stored");
        Ok((blob_id, sealed.backup_key))
    }
}
