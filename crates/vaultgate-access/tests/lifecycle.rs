//! Ledger-backed tests of the registry, allow-list manager, service
//! registry and grant issuer.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vaultgate_access::{
    AccessDecisionEngine, AccessEntry, AccessError, AccessScope, AllowListManager, GrantIssuer,
    GrantStatus, NewItem, NewService, ServiceRegistry, ServiceUpdate, VaultRegistry,
};
use vaultgate_core::{AccessKind, Address, BlobId, EpochMillis, FailureKind, ItemId, ObjectId};
use vaultgate_ledger::{
    InMemoryLedger, Ledger, LedgerError, LedgerObject, ManualClock, Transaction, TxReceipt,
};

const START: EpochMillis = EpochMillis::new(1_768_478_400_000);

struct Harness {
    clock: ManualClock,
    ledger: Arc<dyn Ledger>,
    registry: VaultRegistry,
    allow: AllowListManager,
    services: ServiceRegistry,
    grants: GrantIssuer,
    engine: AccessDecisionEngine,
}

fn harness() -> Harness {
    let clock = ManualClock::new(START);
    let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new(Arc::new(clock.clone())));
    Harness {
        clock,
        registry: VaultRegistry::new(Arc::clone(&ledger)),
        allow: AllowListManager::new(Arc::clone(&ledger)),
        services: ServiceRegistry::new(Arc::clone(&ledger)),
        grants: GrantIssuer::new(Arc::clone(&ledger)),
        engine: AccessDecisionEngine::new(Arc::clone(&ledger)),
        ledger,
    }
}

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

fn new_item(name: &str, kind: AccessKind) -> NewItem {
    NewItem {
        name: name.into(),
        access_kind: kind,
        ciphertext_ref: BlobId::new(format!("blob-{name}")).unwrap(),
        nonce: vec![0xab; 16],
    }
}

fn view_entry(who: &str, expires_at: EpochMillis) -> AccessEntry {
    AccessEntry {
        address: addr(who),
        access_kind: AccessKind::View,
        expires_at,
        grant_id: None,
    }
}

async fn allowed(h: &Harness, item: ItemId, who: &str, kind: AccessKind) -> bool {
    h.engine.decide(item, &addr(who), kind).await.unwrap().decision.is_allow()
}

#[tokio::test]
async fn create_item_appends_to_vault() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let i1 = h.registry.create_item(&owner, &cap, vault.id, new_item("I1", AccessKind::View)).await.unwrap();
    let i2 = h.registry.create_item(&owner, &cap, vault.id, new_item("I2", AccessKind::Edit)).await.unwrap();
    let stored = h.registry.get_vault(vault.id).await.unwrap();
    assert_eq!(stored.items, vec![i1.id, i2.id]);
    let listed = h.registry.list_items(vault.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].access_kind, AccessKind::Edit);
}

#[tokio::test]
async fn update_item_replaces_only_ciphertext() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I1", AccessKind::View)).await.unwrap();
    h.registry
        .update_item(&owner, &cap, vault.id, item.id, BlobId::new("b2").unwrap())
        .await
        .unwrap();
    let stored = h.registry.get_item(item.id).await.unwrap();
    assert_eq!(stored.ciphertext_ref.as_str(), "b2");
    assert_eq!(stored.nonce, item.nonce);
    assert_eq!(stored.access_kind, item.access_kind);
}

#[tokio::test]
async fn capability_for_other_vault_is_unauthorized_everywhere() {
    let h = harness();
    let owner = addr("0xowner");
    let (v1, cap1) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let (v2, cap2) = h.registry.create_vault(&owner, "V2").await.unwrap();
    let item = h.registry.create_item(&owner, &cap1, v1.id, new_item("I1", AccessKind::View)).await.unwrap();

    let err = h.registry.create_item(&owner, &cap2, v1.id, new_item("X", AccessKind::View)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    let err = h
        .registry
        .update_item(&owner, &cap2, v1.id, item.id, BlobId::new("x").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    let err = h.registry.delete_item(&owner, &cap2, v1.id, item.id).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    let expiry = START.saturating_add_minutes(30);
    let err = h
        .allow
        .grant_access(&owner, &cap2, v1.id, AccessScope::Vault, view_entry("0xs", expiry))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);

    // Cap presented with a matching target but for an item in another vault.
    let err = h
        .registry
        .update_item(&owner, &cap2, v2.id, item.id, BlobId::new("x").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    assert_eq!(h.registry.get_item(item.id).await.unwrap().ciphertext_ref, item.ciphertext_ref);
}

#[tokio::test]
async fn caller_without_capability_is_unauthorized() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let err = h
        .registry
        .create_item(&addr("0xmallory"), &cap, vault.id, new_item("I", AccessKind::View))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
}

#[tokio::test]
async fn grant_access_requires_future_expiry() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    for expiry in [START, EpochMillis::new(START.as_millis() - 1)] {
        let err = h
            .allow
            .grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xs", expiry))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidExpiry { .. }));
    }
    assert!(h.registry.get_vault(vault.id).await.unwrap().allow_list.is_empty());
}

#[tokio::test]
async fn repeated_grants_merge_to_later_expiry() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let early = START.saturating_add_minutes(10);
    let late = START.saturating_add_minutes(60);
    h.allow.grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xs", late)).await.unwrap();
    h.allow.grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xs", early)).await.unwrap();
    let list = h.registry.get_vault(vault.id).await.unwrap().allow_list;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].expires_at, late);
}

#[tokio::test]
async fn decide_at_judges_at_the_supplied_instant() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let deadline = START.saturating_add_minutes(10);
    h.allow.grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xs", deadline)).await.unwrap();

    let later = h.engine.decide_at(item.id, &addr("0xs"), AccessKind::View, deadline).await.unwrap();
    assert!(!later.decision.is_allow());
    assert_eq!(later.now, deadline);
    assert!(allowed(&h, item.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn item_scope_entry_covers_only_that_item() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let a = h.registry.create_item(&owner, &cap, vault.id, new_item("A", AccessKind::View)).await.unwrap();
    let b = h.registry.create_item(&owner, &cap, vault.id, new_item("B", AccessKind::View)).await.unwrap();
    let expiry = START.saturating_add_minutes(5);
    h.allow
        .grant_access(&owner, &cap, vault.id, AccessScope::Item(a.id), view_entry("0xs", expiry))
        .await
        .unwrap();
    assert!(allowed(&h, a.id, "0xs", AccessKind::View).await);
    assert!(!allowed(&h, b.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn revoke_removes_only_named_kind() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let expiry = START.saturating_add_minutes(30);
    h.allow.grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xs", expiry)).await.unwrap();
    let edit = AccessEntry {
        access_kind: AccessKind::Edit,
        ..view_entry("0xs", expiry)
    };
    h.allow.grant_access(&owner, &cap, vault.id, AccessScope::Vault, edit).await.unwrap();

    let removed = h
        .allow
        .revoke_access(&owner, &cap, vault.id, AccessScope::Vault, &addr("0xs"), AccessKind::View)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(!allowed(&h, item.id, "0xs", AccessKind::View).await);
    assert!(allowed(&h, item.id, "0xs", AccessKind::Edit).await);

    let removed = h
        .allow
        .revoke_access(&owner, &cap, vault.id, AccessScope::Vault, &addr("0xs"), AccessKind::View)
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn compaction_drops_expired_without_changing_decisions() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    h.allow
        .grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xa", START.saturating_add_minutes(1)))
        .await
        .unwrap();
    h.allow
        .grant_access(&owner, &cap, vault.id, AccessScope::Item(item.id), view_entry("0xb", START.saturating_add_minutes(1)))
        .await
        .unwrap();
    h.allow
        .grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xc", START.saturating_add_minutes(90)))
        .await
        .unwrap();
    h.clock.advance_minutes(2);

    let before: Vec<bool> = decisions_for_grantees(&h, item.id).await;
    assert_eq!(h.allow.compact_allow_list(&owner, &cap, vault.id).await.unwrap(), 2);
    assert_eq!(h.allow.compact_allow_list(&owner, &cap, vault.id).await.unwrap(), 0);
    assert_eq!(decisions_for_grantees(&h, item.id).await, before);
    assert_eq!(h.registry.get_vault(vault.id).await.unwrap().allow_list.len(), 1);
}

async fn decisions_for_grantees(h: &Harness, item: ItemId) -> Vec<bool> {
    let mut out = Vec::new();
    for who in ["0xa", "0xb", "0xc"] {
        out.push(allowed(h, item, who, AccessKind::View).await);
    }
    out
}

#[tokio::test]
async fn delete_item_then_vault() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V3").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I3", AccessKind::View)).await.unwrap();

    let err = h.registry.delete_vault(&owner, &cap, vault.id).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::VaultNotEmpty);

    h.registry.delete_item(&owner, &cap, vault.id, item.id).await.unwrap();
    assert!(h.registry.get_item(item.id).await.is_err());
    h.registry.delete_vault(&owner, &cap, vault.id).await.unwrap();
    assert!(h.registry.owned_vault_capabilities(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn transfer_moves_rights_but_not_owner_bypass() {
    let h = harness();
    let (alice, bob) = (addr("0xalice"), addr("0xbob"));
    let (vault, cap) = h.registry.create_vault(&alice, "V").await.unwrap();
    let item = h.registry.create_item(&alice, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();

    h.registry.transfer_vault_capability(&alice, &cap, &bob).await.unwrap();

    let err = h.registry.create_item(&alice, &cap, vault.id, new_item("X", AccessKind::View)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    h.registry.create_item(&bob, &cap, vault.id, new_item("Y", AccessKind::View)).await.unwrap();

    assert!(allowed(&h, item.id, "0xalice", AccessKind::Delete).await);
    assert!(!allowed(&h, item.id, "0xbob", AccessKind::View).await);
    assert_eq!(h.registry.owned_vault_capabilities(&bob).await.unwrap().len(), 1);
}

async fn service(h: &Harness, client_id: &str, kinds: &[AccessKind]) -> vaultgate_access::OAuthService {
    h.services
        .register_service(
            &addr("0xs"),
            NewService {
                client_id: client_id.into(),
                redirect_url: "https://svc.example/callback".into(),
                resource_kinds: kinds.iter().copied().collect(),
            },
        )
        .await
        .unwrap()
        .0
}

#[tokio::test]
async fn services_share_client_ids_and_update_through_capability() {
    let h = harness();
    let operator = addr("0xs");
    let (first, cap) = h
        .services
        .register_service(
            &operator,
            NewService {
                client_id: "shared".into(),
                redirect_url: "https://one.example/cb".into(),
                resource_kinds: BTreeSet::new(),
            },
        )
        .await
        .unwrap();
    h.clock.advance_millis(1);
    service(&h, "shared", &[AccessKind::View]).await;
    service(&h, "other", &[]).await;

    let found = h.services.find_services_by_client_id("shared").await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, first.id);

    h.services
        .update_service(
            &operator,
            &cap,
            first.id,
            ServiceUpdate {
                redirect_url: Some("https://moved.example/cb".into()),
                resource_kinds: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        h.services.get_service(first.id).await.unwrap().redirect_url,
        "https://moved.example/cb"
    );

    let err = h
        .services
        .update_service(&addr("0xother"), &cap, first.id, ServiceUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);

    h.services.delete_service(&operator, &cap, first.id).await.unwrap();
    assert_eq!(h.services.find_services_by_client_id("shared").await.unwrap().len(), 1);
}

#[tokio::test]
async fn issued_grant_is_found_by_token_and_expires_lazily() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I1", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[AccessKind::View]).await;

    let mut request = h.grants.begin_authorization(svc.id, &owner).await.unwrap();
    assert_eq!(request.candidates().len(), 1);
    request.select(&[item.id]).unwrap();
    let grant = request.issue(&h.grants, 30).await.unwrap();

    assert_eq!(grant.resource_ids, vec![item.id]);
    assert_eq!(grant.expires_at, START.saturating_add_minutes(30));
    assert_eq!(grant.bearer_token.expose().len(), 64);

    let found = h.grants.find_grant_by_token(grant.bearer_token.expose()).await.unwrap().unwrap();
    assert_eq!(found.id, grant.id);
    assert!(h.grants.find_grant_by_token(&"0".repeat(64)).await.unwrap().is_none());
    assert!(h.grants.find_grant_by_token("short").await.unwrap().is_none());

    assert_eq!(h.grants.grant_status(grant.id).await.unwrap(), GrantStatus::Active);
    assert!(allowed(&h, item.id, "0xs", AccessKind::View).await);
    h.clock.advance_minutes(30);
    assert_eq!(h.grants.grant_status(grant.id).await.unwrap(), GrantStatus::Expired);
    assert!(!allowed(&h, item.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn grant_inserts_one_entry_per_vault_and_kind() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let a = h.registry.create_item(&owner, &cap, vault.id, new_item("A", AccessKind::View)).await.unwrap();
    let b = h.registry.create_item(&owner, &cap, vault.id, new_item("B", AccessKind::View)).await.unwrap();
    let c = h.registry.create_item(&owner, &cap, vault.id, new_item("C", AccessKind::Edit)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;

    let grant = h.grants.issue_grant(&svc, &owner, &[a.id, b.id, c.id, a.id], 10).await.unwrap();
    assert_eq!(grant.resource_ids.len(), 3);
    assert_eq!(grant.entries.len(), 2);
    let list = h.registry.get_vault(vault.id).await.unwrap().allow_list;
    assert_eq!(list.len(), 2);
}

#[tokio::test]
async fn undeclared_kind_fails_closed() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::Delete)).await.unwrap();
    let svc = service(&h, "svc", &[AccessKind::View]).await;
    let err = h.grants.issue_grant(&svc, &owner, &[item.id], 10).await.unwrap_err();
    assert!(matches!(err, AccessError::KindNotDeclared { .. }));
    assert!(h.registry.get_vault(vault.id).await.unwrap().allow_list.is_empty());
}

#[tokio::test]
async fn zero_ttl_and_empty_selection_are_rejected() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;
    assert_eq!(
        h.grants.issue_grant(&svc, &owner, &[item.id], 0).await.unwrap_err().kind(),
        FailureKind::InvalidExpiry
    );
    assert_eq!(
        h.grants.issue_grant(&svc, &owner, &[], 10).await.unwrap_err().kind(),
        FailureKind::Validation
    );
}

#[tokio::test]
async fn revoking_grant_removes_its_entries_atomically() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;
    let grant = h.grants.issue_grant(&svc, &owner, &[item.id], 30).await.unwrap();

    let err = h.grants.revoke_grant(&addr("0xother"), grant.id).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);

    h.grants.revoke_grant(&owner, grant.id).await.unwrap();
    assert_eq!(h.grants.grant_status(grant.id).await.unwrap(), GrantStatus::Revoked);
    assert!(h.registry.get_vault(vault.id).await.unwrap().allow_list.is_empty());
    assert!(!allowed(&h, item.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn revoking_longer_grant_keeps_overlapping_grant_alive() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;
    let short = h.grants.issue_grant(&svc, &owner, &[item.id], 10).await.unwrap();
    let long = h.grants.issue_grant(&svc, &owner, &[item.id], 30).await.unwrap();

    h.grants.revoke_grant(&owner, long.id).await.unwrap();
    h.clock.advance_minutes(1);
    assert_eq!(h.grants.grant_status(short.id).await.unwrap(), GrantStatus::Active);
    assert!(allowed(&h, item.id, "0xs", AccessKind::View).await);

    h.clock.advance_minutes(9);
    assert!(!allowed(&h, item.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn revoking_grant_keeps_direct_entry_for_same_recipient() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;
    let direct = START.saturating_add_minutes(60);
    h.allow.grant_access(&owner, &cap, vault.id, AccessScope::Vault, view_entry("0xs", direct)).await.unwrap();
    let grant = h.grants.issue_grant(&svc, &owner, &[item.id], 30).await.unwrap();

    h.grants.revoke_grant(&owner, grant.id).await.unwrap();
    let list = h.registry.get_vault(vault.id).await.unwrap().allow_list;
    assert_eq!(list, vec![view_entry("0xs", direct)]);
    h.clock.advance_minutes(45);
    assert!(allowed(&h, item.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn revoking_allow_list_does_not_touch_grant_record() {
    let h = harness();
    let owner = addr("0xowner");
    let (vault, cap) = h.registry.create_vault(&owner, "V1").await.unwrap();
    let item = h.registry.create_item(&owner, &cap, vault.id, new_item("I", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;
    let grant = h.grants.issue_grant(&svc, &owner, &[item.id], 30).await.unwrap();

    h.allow
        .revoke_access(&owner, &cap, vault.id, AccessScope::Vault, &svc.owner, AccessKind::View)
        .await
        .unwrap();
    assert_eq!(h.grants.grant_status(grant.id).await.unwrap(), GrantStatus::Active);
    assert!(!allowed(&h, item.id, "0xs", AccessKind::View).await);
}

#[tokio::test]
async fn issuance_across_uncontrolled_vault_leaves_no_trace() {
    let h = harness();
    let owner = addr("0xowner");
    let stranger = addr("0xstranger");
    let (mine, my_cap) = h.registry.create_vault(&owner, "mine").await.unwrap();
    let (theirs, their_cap) = h.registry.create_vault(&stranger, "theirs").await.unwrap();
    let a = h.registry.create_item(&owner, &my_cap, mine.id, new_item("A", AccessKind::View)).await.unwrap();
    let b = h.registry.create_item(&stranger, &their_cap, theirs.id, new_item("B", AccessKind::View)).await.unwrap();
    let svc = service(&h, "svc", &[]).await;

    let err = h.grants.issue_grant(&svc, &owner, &[a.id, b.id], 30).await.unwrap_err();
    assert_eq!(err, AccessError::NoCapabilityForVault(theirs.id));
    assert!(h.registry.get_vault(mine.id).await.unwrap().allow_list.is_empty());
    assert!(h.ledger.objects_of_kind("oauth_grant").await.unwrap().is_empty());
}

/// Runs a queued transaction immediately before the next one, simulating
/// a concurrent writer landing between issuance's reads and its commit.
struct RacingLedger {
    inner: InMemoryLedger,
    interloper: Mutex<Option<Transaction>>,
}

#[async_trait]
impl Ledger for RacingLedger {
    async fn get_object(&self, id: ObjectId) -> Result<LedgerObject, LedgerError> {
        self.inner.get_object(id).await
    }

    async fn execute(&self, tx: Transaction) -> Result<TxReceipt, LedgerError> {
        let queued = self.interloper.lock().unwrap().take();
        if let Some(first) = queued {
            self.inner.execute(first).await?;
        }
        self.inner.execute(tx).await
    }

    async fn now(&self) -> Result<EpochMillis, LedgerError> {
        self.inner.now().await
    }

    async fn owned_objects(&self, holder: &Address, kind: &str) -> Result<Vec<LedgerObject>, LedgerError> {
        self.inner.owned_objects(holder, kind).await
    }

    async fn objects_of_kind(&self, kind: &str) -> Result<Vec<LedgerObject>, LedgerError> {
        self.inner.objects_of_kind(kind).await
    }
}

#[tokio::test]
async fn issuance_rolls_back_when_a_later_vault_fails_on_commit() {
    let inner = InMemoryLedger::new(Arc::new(ManualClock::new(START)));
    let racing = Arc::new(RacingLedger {
        inner: inner.clone(),
        interloper: Mutex::new(None),
    });
    let ledger: Arc<dyn Ledger> = racing.clone();
    let registry = VaultRegistry::new(Arc::clone(&ledger));
    let services = ServiceRegistry::new(Arc::clone(&ledger));
    let grants = GrantIssuer::new(Arc::clone(&ledger));

    let owner = addr("0xowner");
    let (first, cap1) = registry.create_vault(&owner, "first").await.unwrap();
    let (second, cap2) = registry.create_vault(&owner, "second").await.unwrap();
    let a = registry.create_item(&owner, &cap1, first.id, new_item("A", AccessKind::View)).await.unwrap();
    let b = registry.create_item(&owner, &cap2, second.id, new_item("B", AccessKind::View)).await.unwrap();
    let (svc, _) = services
        .register_service(
            &addr("0xs"),
            NewService {
                client_id: "svc".into(),
                redirect_url: "https://svc.example/cb".into(),
                resource_kinds: BTreeSet::new(),
            },
        )
        .await
        .unwrap();

    // The second vault's capability moves away after issuance has looked
    // up capabilities but before its transaction commits.
    let mut steal = Transaction::new(owner.clone());
    steal.transfer(cap2.id, addr("0xthief"));
    *racing.interloper.lock().unwrap() = Some(steal);

    let err = grants.issue_grant(&svc, &owner, &[a.id, b.id], 30).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    assert!(registry.get_vault(first.id).await.unwrap().allow_list.is_empty());
    assert!(registry.get_vault(second.id).await.unwrap().allow_list.is_empty());
    assert!(inner.objects_of_kind("oauth_grant").await.unwrap().is_empty());
}
