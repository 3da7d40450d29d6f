//! # Decryption Gate
//!
//! ```text
//! 1. validate session credential (domain, TTL, signature, address binding)
//! 2. resolve item + vault and decide(View)      ── deny: stop, no external calls
//! 3. fetch ciphertext from the blob store       ── timeout, optional cache
//! 4. derive identity, build + sign artifact
//! 5. oracle decrypt                             ── timeout, concurrency-bounded
//! ```
//!
//! Steps 1 and 2 fail closed. Blob and oracle are never contacted for a
//! request that is not allowed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use vaultgate_access::{AccessDecisionEngine, AllowBasis, Decision, DenyReason, Item};
use vaultgate_core::{AccessKind, BlobId, EpochMillis, ItemId, VaultId};
use vaultgate_ledger::Ledger;

use crate::artifact::DecryptionArtifact;
use crate::blob::BlobStore;
use crate::cache::BlobCache;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::identity::{identity_strategy, IdentityStrategy};
use crate::oracle::DecryptOracle;
use crate::session::{SessionCredential, Signed};

/// Which item to decrypt, and the vault the caller believes holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptRequest {
    /// Vault the item is expected in.
    pub vault_id: VaultId,
    /// Item to decrypt.
    pub item_id: ItemId,
}

/// Plaintext released by the gate.
pub struct Decrypted {
    /// Item decrypted.
    pub item_id: ItemId,
    /// Its vault.
    pub vault_id: VaultId,
    /// Why the decision allowed it.
    pub basis: AllowBasis,
    /// Decrypted bytes.
    pub plaintext: Vec<u8>,
}

impl std::fmt::Debug for Decrypted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decrypted")
            .field("item_id", &self.item_id)
            .field("vault_id", &self.vault_id)
            .field("basis", &self.basis)
            .field("size", &self.plaintext.len())
            .finish()
    }
}

/// Run `fut` under `limit`, mapping its error into [`GateError`].
pub(crate) async fn bounded<T, E>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, GateError>
where
    GateError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(GateError::from),
        Err(_) => {
            tracing::warn!(operation, ?limit, "external call timed out");
            Err(GateError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}

/// The decryption gate.
#[derive(Clone)]
pub struct DecryptionGate {
    ledger: Arc<dyn Ledger>,
    engine: AccessDecisionEngine,
    blobs: Arc<dyn BlobStore>,
    oracle: Arc<dyn DecryptOracle>,
    identity: Arc<dyn IdentityStrategy>,
    cache: Option<BlobCache>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    domain: String,
    clock_skew: Duration,
}

impl DecryptionGate {
    /// Assemble a gate from its collaborators and configuration.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        blobs: Arc<dyn BlobStore>,
        oracle: Arc<dyn DecryptOracle>,
        config: &GateConfig,
    ) -> Self {
        Self {
            engine: AccessDecisionEngine::new(ledger.clone()),
            ledger,
            blobs,
            oracle,
            identity: identity_strategy(&config.identity_mode),
            cache: config.blob_cache_ttl.map(BlobCache::new),
            permits: Arc::new(Semaphore::new(config.max_concurrent_decrypts.max(1))),
            timeout: config.external_timeout,
            domain: config.domain.clone(),
            clock_skew: config.clock_skew,
        }
    }

    /// Replace the identity strategy.
    pub fn with_identity_strategy(mut self, identity: Arc<dyn IdentityStrategy>) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the blob cache; `None` disables caching.
    pub fn with_cache(mut self, cache: Option<BlobCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Domain credentials must be bound to.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Ledger the gate reads from.
    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Reset the oracle between caller retries.
    pub fn reset_oracle(&self) {
        self.oracle.reset();
    }

    /// Decrypt one item for the credential's address.
    pub async fn decrypt(
        &self,
        credential: &SessionCredential<Signed>,
        request: DecryptRequest,
    ) -> Result<Decrypted, GateError> {
        let result = self.run(credential, request).await;
        let outcome = match &result {
            Ok(decrypted) => {
                tracing::info!(
                    item = %decrypted.item_id,
                    requester = %credential.address(),
                    basis = ?decrypted.basis,
                    size = decrypted.plaintext.len(),
                    "item decrypted"
                );
                "ok"
            }
            Err(e) => {
                tracing::warn!(
                    item = %request.item_id,
                    requester = %credential.address(),
                    kind = e.kind().code(),
                    "decryption refused: {e}"
                );
                e.kind().code()
            }
        };
        metrics::counter!("vaultgate_decrypt_total", "outcome" => outcome).increment(1);
        result
    }

    /// Decrypt several items concurrently, one result per request in order.
    ///
    /// Oracle calls are bounded by `max_concurrent_decrypts`; one failure
    /// does not affect the others.
    pub async fn decrypt_batch(
        &self,
        credential: &SessionCredential<Signed>,
        requests: &[DecryptRequest],
    ) -> Vec<Result<Decrypted, GateError>> {
        futures::future::join_all(requests.iter().map(|req| self.decrypt(credential, *req))).await
    }

    async fn run(
        &self,
        credential: &SessionCredential<Signed>,
        request: DecryptRequest,
    ) -> Result<Decrypted, GateError> {
        let now = bounded("ledger clock", self.timeout, self.ledger.now()).await?;
        credential.validate_with_skew(&self.domain, now, self.clock_skew)?;

        let resolved = bounded(
            "access decision",
            self.timeout,
            self.engine.decide_at(request.item_id, credential.address(), AccessKind::View, now),
        )
        .await?;
        let item = resolved.item;
        if item.vault_id != request.vault_id {
            return Err(GateError::VaultMismatch {
                item: item.id,
                requested: request.vault_id,
                actual: item.vault_id,
            });
        }
        let basis = match resolved.decision {
            Decision::Allow(basis) => basis,
            Decision::Deny(DenyReason::DanglingReference { vault }) => {
                return Err(GateError::DanglingReference { item: item.id, vault })
            }
            Decision::Deny(reason) => return Err(GateError::AccessDenied(reason)),
        };

        let ciphertext = self.fetch_ciphertext(&item.ciphertext_ref).await?;
        let artifact = self.artifact_for(&item, credential, resolved.now)?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GateError::Internal("decrypt permits closed".into()))?;
        let plaintext = bounded(
            "oracle decrypt",
            self.timeout,
            self.oracle.decrypt(&ciphertext, &artifact, credential),
        )
        .await?;

        Ok(Decrypted {
            item_id: item.id,
            vault_id: item.vault_id,
            basis,
            plaintext,
        })
    }

    async fn fetch_ciphertext(&self, blob: &BlobId) -> Result<Arc<Vec<u8>>, GateError> {
        if let Some(bytes) = self.cache.as_ref().and_then(|cache| cache.get(blob)) {
            tracing::debug!(%blob, "blob cache hit");
            return Ok(bytes);
        }
        let bytes = Arc::new(bounded("blob read", self.timeout, self.blobs.read(blob)).await?);
        if let Some(cache) = &self.cache {
            cache.insert(blob.clone(), bytes.clone());
        }
        Ok(bytes)
    }

    fn artifact_for(
        &self,
        item: &Item,
        credential: &SessionCredential<Signed>,
        now: EpochMillis,
    ) -> Result<DecryptionArtifact, GateError> {
        let identity = self.identity.derive(item.vault_id, &item.nonce);
        let artifact = DecryptionArtifact::build(identity, item.vault_id, item.id, credential, now)?;
        let binding = artifact.binding_digest()?;
        tracing::debug!(
            item = %item.id,
            strategy = self.identity.name(),
            %binding,
            "decryption artifact built"
        );
        Ok(artifact)
    }
}

impl std::fmt::Debug for DecryptionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionGate")
            .field("identity", &self.identity.name())
            .field("cache", &self.cache.is_some())
            .field("timeout", &self.timeout)
            .field("domain", &self.domain)
            .finish()
    }
}
