//! # Grant Issuer
//!
//! Lifecycle of an OAuth grant:
//!
//! ```text
//! NONE → PENDING_SELECTION → ISSUED → ACTIVE | EXPIRED | REVOKED
//! ```
//!
//! `PENDING_SELECTION` is an [`AuthorizationRequest`]: the owner's items
//! are loaded and a subset is being chosen. Nothing is on the ledger yet.
//! Issuance inserts the allow-list entries and the grant record in a single
//! transaction. `ACTIVE` and `EXPIRED` are evaluated from ledger time on
//! every read; `REVOKED` means the grant record no longer exists.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vaultgate_core::{
    AccessKind, Address, EpochMillis, FailureKind, GrantId, ItemId, ServiceId, ValidationError,
    VaultId,
};
use vaultgate_crypto::BearerToken;
use vaultgate_ledger::{load, load_optional, Abort, Authority, Guard, Ledger, LedgerRecord, Transaction};

use crate::allow_list::merge_entry;
use crate::error::AccessError;
use crate::records::{AccessEntry, GrantedEntry, Item, OAuthGrant, OAuthService, Vault, VaultCapability};
use crate::registry::VaultRegistry;

/// Evaluated state of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantStatus {
    /// Record exists and `now < expires_at`.
    Active,
    /// Record exists and its deadline has passed.
    Expired,
    /// Record was deleted.
    Revoked,
}

/// Status of an existing grant at `now`.
pub fn status_at(grant: &OAuthGrant, now: EpochMillis) -> GrantStatus {
    if now < grant.expires_at {
        GrantStatus::Active
    } else {
        GrantStatus::Expired
    }
}

/// An owner choosing which items to disclose to a service.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    service: OAuthService,
    user: Address,
    candidates: Vec<Item>,
    selected: Vec<ItemId>,
}

impl AuthorizationRequest {
    /// Start a selection over `candidates`.
    pub fn new(service: OAuthService, user: Address, candidates: Vec<Item>) -> Self {
        Self {
            service,
            user,
            candidates,
            selected: Vec::new(),
        }
    }

    /// The requesting service.
    pub fn service(&self) -> &OAuthService {
        &self.service
    }

    /// The authorizing owner.
    pub fn user(&self) -> &Address {
        &self.user
    }

    /// Items the owner may choose from.
    pub fn candidates(&self) -> &[Item] {
        &self.candidates
    }

    /// Current selection.
    pub fn selected(&self) -> &[ItemId] {
        &self.selected
    }

    /// Replace the selection. Every id must be a candidate; duplicates
    /// collapse, first occurrence wins.
    pub fn select(&mut self, ids: &[ItemId]) -> Result<(), AccessError> {
        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.candidates.iter().any(|c| c.id == *id) {
                return Err(ValidationError::Malformed {
                    field: "resource_ids",
                    reason: format!("item {id} is not among the owner's items"),
                }
                .into());
            }
            if !selected.contains(id) {
                selected.push(*id);
            }
        }
        self.selected = selected;
        Ok(())
    }

    /// Issue a grant for the current selection.
    pub async fn issue(self, issuer: &GrantIssuer, ttl_minutes: u64) -> Result<OAuthGrant, AccessError> {
        issuer
            .issue_grant(&self.service, &self.user, &self.selected, ttl_minutes)
            .await
    }
}

/// Grant issuance, lookup and revocation over the ledger.
#[derive(Clone)]
pub struct GrantIssuer {
    ledger: Arc<dyn Ledger>,
    registry: VaultRegistry,
}

impl GrantIssuer {
    /// Create an issuer over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            registry: VaultRegistry::new(Arc::clone(&ledger)),
            ledger,
        }
    }

    /// Load the service and every item in vaults `user` controls.
    pub async fn begin_authorization(
        &self,
        service_id: ServiceId,
        user: &Address,
    ) -> Result<AuthorizationRequest, AccessError> {
        let service: OAuthService = load(self.ledger.as_ref(), service_id).await?;
        let caps = self.registry.owned_vault_capabilities(user).await?;
        let per_vault =
            futures::future::try_join_all(caps.iter().map(|cap| self.registry.list_items(cap.target))).await?;
        let candidates = per_vault.into_iter().flatten().collect();
        Ok(AuthorizationRequest::new(service, user.clone(), candidates))
    }

    /// Issue a grant of `selected` items to `service` for `ttl_minutes`.
    ///
    /// For each distinct vault the selection touches, the service owner's
    /// address gets one entry per item access kind, tagged with the grant
    /// id and expiring with the grant. Entries and the grant record commit
    /// together or not at all.
    ///
    /// # Errors
    ///
    /// - [`AccessError::InvalidExpiry`] for a zero TTL.
    /// - [`AccessError::NoCapabilityForVault`] if `user` holds no
    ///   capability for some vault in the selection.
    /// - [`AccessError::KindNotDeclared`] if an item's kind is outside the
    ///   service's declared kinds.
    pub async fn issue_grant(
        &self,
        service: &OAuthService,
        user: &Address,
        selected: &[ItemId],
        ttl_minutes: u64,
    ) -> Result<OAuthGrant, AccessError> {
        let mut resource_ids: Vec<ItemId> = Vec::with_capacity(selected.len());
        for id in selected {
            if !resource_ids.contains(id) {
                resource_ids.push(*id);
            }
        }
        if resource_ids.is_empty() {
            return Err(ValidationError::EmptyField { field: "resource_ids" }.into());
        }

        let now = self.ledger.now().await?;
        let expires_at = now.saturating_add_minutes(ttl_minutes);
        if expires_at <= now {
            return Err(AccessError::InvalidExpiry { expires_at, now });
        }

        let items: Vec<Item> =
            futures::future::try_join_all(resource_ids.iter().map(|id| load::<Item>(self.ledger.as_ref(), *id)))
                .await?;

        let mut per_vault: BTreeMap<VaultId, (BTreeSet<AccessKind>, Vec<ItemId>)> = BTreeMap::new();
        for item in &items {
            if !service.accepts(item.access_kind) {
                return Err(AccessError::KindNotDeclared {
                    client_id: service.client_id.clone(),
                    kind: item.access_kind,
                });
            }
            let slot = per_vault.entry(item.vault_id).or_default();
            slot.0.insert(item.access_kind);
            slot.1.push(item.id);
        }

        let caps = self.capabilities_by_vault(user).await?;
        let grant_id = GrantId::new();
        let mut tx = Transaction::new(user.clone());
        let mut entries = Vec::new();
        for (vault_id, (kinds, item_ids)) in per_vault {
            let Some(cap) = caps.get(&vault_id) else {
                tracing::warn!(vault = %vault_id, user = %user, "grant issuance references a vault the owner does not control");
                return Err(AccessError::NoCapabilityForVault(vault_id));
            };
            entries.extend(kinds.iter().map(|kind| GrantedEntry {
                vault_id,
                access_kind: *kind,
            }));
            let grantee = service.owner.clone();
            tx.update::<Vault, _>(vault_id, Authority::Capability(cap.id.object_id()), move |vault| {
                if let Some(missing) = item_ids.iter().find(|id| !vault.contains(id)) {
                    return Err(Abort::new(
                        FailureKind::DanglingReference,
                        format!("vault no longer lists item {missing}"),
                    ));
                }
                for kind in kinds {
                    merge_entry(
                        &mut vault.allow_list,
                        AccessEntry {
                            address: grantee.clone(),
                            access_kind: kind,
                            expires_at,
                            grant_id: Some(grant_id),
                        },
                    );
                }
                Ok(())
            });
        }

        let grant = OAuthGrant {
            id: grant_id,
            service_id: service.id,
            client_id: service.client_id.clone(),
            user_address: user.clone(),
            owner_address: service.owner.clone(),
            resource_ids,
            entries,
            created_at: now,
            expires_at,
            bearer_token: BearerToken::generate(),
        };
        tx.create(&grant, Guard::Holder(user.clone()))?;
        self.ledger.execute(tx).await?;

        metrics::counter!("vaultgate_grants_issued_total").increment(1);
        tracing::info!(
            grant = %grant.id,
            client_id = %grant.client_id,
            user = %user,
            recipient = %grant.owner_address,
            items = grant.resource_ids.len(),
            expires_at = %expires_at,
            "grant issued"
        );
        Ok(grant)
    }

    /// Read a grant. `None` if it was revoked or never existed.
    pub async fn get_grant(&self, grant_id: GrantId) -> Result<Option<OAuthGrant>, AccessError> {
        Ok(load_optional(self.ledger.as_ref(), grant_id).await?)
    }

    /// Find the grant carrying `token`. Tokens are compared in constant
    /// time and every grant is compared.
    pub async fn find_grant_by_token(&self, token: &str) -> Result<Option<OAuthGrant>, AccessError> {
        if BearerToken::parse(token).is_err() {
            return Ok(None);
        }
        let mut found = None;
        for object in self.ledger.objects_of_kind(OAuthGrant::KIND).await? {
            let grant: OAuthGrant = object.decode()?;
            if grant.bearer_token.matches(token) && found.is_none() {
                found = Some(grant);
            }
        }
        Ok(found)
    }

    /// Evaluated status of a grant at current ledger time.
    pub async fn grant_status(&self, grant_id: GrantId) -> Result<GrantStatus, AccessError> {
        let (grant, now) = futures::try_join!(
            load_optional::<OAuthGrant>(self.ledger.as_ref(), grant_id),
            self.ledger.now(),
        )?;
        Ok(grant.map_or(GrantStatus::Revoked, |g| status_at(&g, now)))
    }

    /// Delete a grant and the allow-list entries it inserted.
    ///
    /// Only entries tagged with this grant are removed; access granted
    /// directly or by another grant to the same recipient is untouched.
    /// Vaults deleted since issuance are skipped.
    pub async fn revoke_grant(&self, user: &Address, grant_id: GrantId) -> Result<(), AccessError> {
        let grant: OAuthGrant = load(self.ledger.as_ref(), grant_id).await?;
        if &grant.user_address != user {
            return Err(AccessError::Unauthorized(format!(
                "grant {grant_id} was not authorized by {user}"
            )));
        }
        let caps = self.capabilities_by_vault(user).await?;
        let vaults: BTreeSet<VaultId> = grant.entries.iter().map(|e| e.vault_id).collect();

        let mut tx = Transaction::new(user.clone());
        tx.delete::<OAuthGrant>(grant_id, Authority::Sender);
        for vault_id in vaults {
            if load_optional::<Vault>(self.ledger.as_ref(), vault_id).await?.is_none() {
                continue;
            }
            let cap = caps
                .get(&vault_id)
                .ok_or(AccessError::NoCapabilityForVault(vault_id))?;
            tx.update::<Vault, _>(vault_id, Authority::Capability(cap.id.object_id()), move |vault| {
                vault.allow_list.retain(|e| e.grant_id != Some(grant_id));
                Ok(())
            });
        }
        self.ledger.execute(tx).await?;
        tracing::info!(grant = %grant_id, user = %user, "grant revoked");
        Ok(())
    }

    async fn capabilities_by_vault(
        &self,
        user: &Address,
    ) -> Result<HashMap<VaultId, VaultCapability>, AccessError> {
        Ok(self
            .registry
            .owned_vault_capabilities(user)
            .await?
            .into_iter()
            .map(|cap| (cap.target, cap))
            .collect())
    }
}
