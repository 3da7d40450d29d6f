//! # Ledger Records
//!
//! The typed records the access control plane keeps on the ledger. Each
//! implements [`LedgerRecord`], so it has exactly one decoding contract.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vaultgate_core::{
    AccessKind, Address, BlobId, CapabilityId, EpochMillis, GrantId, ItemId, ObjectId, ServiceId,
    VaultId,
};
use vaultgate_crypto::BearerToken;
use vaultgate_ledger::LedgerRecord;

/// A standing grant of one access kind to one address until a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    /// Grantee.
    pub address: Address,
    /// The single kind granted.
    pub access_kind: AccessKind,
    /// Exclusive deadline.
    pub expires_at: EpochMillis,
    /// Grant that inserted the entry; `None` for entries added directly
    /// by the vault holder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<GrantId>,
}

impl AccessEntry {
    /// Active iff `now < expires_at`.
    pub fn is_active(&self, now: EpochMillis) -> bool {
        now < self.expires_at
    }

    /// Whether this entry grants `kind` to `address` at `now`.
    pub fn permits(&self, address: &Address, kind: AccessKind, now: EpochMillis) -> bool {
        &self.address == address && self.access_kind == kind && self.is_active(now)
    }
}

/// A data vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// Vault identifier.
    pub id: VaultId,
    /// Creator. Keeps the ownership bypass even if the capability moves.
    pub owner: Address,
    /// Display name of the vault.
    pub group_name: String,
    /// Item ids in insertion order, without duplicates.
    pub items: Vec<ItemId>,
    /// Vault-scope allow-list.
    pub allow_list: Vec<AccessEntry>,
}

impl Vault {
    /// Whether `item` is registered in this vault.
    pub fn contains(&self, item: &ItemId) -> bool {
        self.items.contains(item)
    }
}

impl LedgerRecord for Vault {
    const KIND: &'static str = "vault";
    fn object_id(&self) -> ObjectId {
        self.id.object_id()
    }
}

/// A data item: a reference to ciphertext plus the inputs of its
/// encryption identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item identifier.
    pub id: ItemId,
    /// Back-reference to the vault whose `items` lists this item.
    pub vault_id: VaultId,
    /// Display name.
    pub name: String,
    /// Access kind this item is shared under when a grant is issued.
    pub access_kind: AccessKind,
    /// Blob holding the current ciphertext.
    pub ciphertext_ref: BlobId,
    /// Per-item nonce for identity derivation. Immutable.
    #[serde(with = "hex::serde")]
    pub nonce: Vec<u8>,
    /// Item-scope allow-list.
    pub allow_list: Vec<AccessEntry>,
}

impl LedgerRecord for Item {
    const KIND: &'static str = "item";
    fn object_id(&self) -> ObjectId {
        self.id.object_id()
    }
}

/// A registered third-party service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthService {
    /// Service identifier.
    pub id: ServiceId,
    /// OAuth client id. Not unique across services.
    pub client_id: String,
    /// Service-side address placed on allow-lists when a grant is issued.
    pub owner: Address,
    /// Where the owner's client returns after authorization.
    pub redirect_url: String,
    /// Access kinds the service asks for. Empty means unrestricted.
    pub resource_kinds: BTreeSet<AccessKind>,
    /// Registration time.
    pub created_at: EpochMillis,
}

impl OAuthService {
    /// Whether the service declared `kind`.
    pub fn accepts(&self, kind: AccessKind) -> bool {
        self.resource_kinds.is_empty() || self.resource_kinds.contains(&kind)
    }
}

impl LedgerRecord for OAuthService {
    const KIND: &'static str = "oauth_service";
    fn object_id(&self) -> ObjectId {
        self.id.object_id()
    }
}

/// An allow-list entry inserted on behalf of a grant, kept so the grant
/// can be revoked precisely.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantedEntry {
    /// Vault whose allow-list received the entry.
    pub vault_id: VaultId,
    /// Kind inserted.
    pub access_kind: AccessKind,
}

/// An issued OAuth grant. Never mutated after creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthGrant {
    /// Grant identifier.
    pub id: GrantId,
    /// Service the grant was issued to.
    pub service_id: ServiceId,
    /// Client id of that service.
    pub client_id: String,
    /// Owner who authorized the grant.
    pub user_address: Address,
    /// Service-side recipient placed on allow-lists.
    pub owner_address: Address,
    /// Items disclosed.
    pub resource_ids: Vec<ItemId>,
    /// Entries inserted at issuance.
    pub entries: Vec<GrantedEntry>,
    /// Issuance time.
    pub created_at: EpochMillis,
    /// Exclusive deadline.
    pub expires_at: EpochMillis,
    /// Correlation handle returned to the service.
    pub bearer_token: BearerToken,
}

impl std::fmt::Debug for OAuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthGrant")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("user_address", &self.user_address)
            .field("owner_address", &self.owner_address)
            .field("resource_ids", &self.resource_ids)
            .field("expires_at", &self.expires_at)
            .field("bearer_token", &self.bearer_token)
            .finish_non_exhaustive()
    }
}

impl LedgerRecord for OAuthGrant {
    const KIND: &'static str = "oauth_grant";
    fn object_id(&self) -> ObjectId {
        self.id.object_id()
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Identifier type a capability can govern.
pub trait CapabilityTarget:
    Copy + Eq + std::fmt::Debug + std::fmt::Display + Into<ObjectId> + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Ledger kind of capabilities over this target type.
    const CAPABILITY_KIND: &'static str;
}

impl CapabilityTarget for VaultId {
    const CAPABILITY_KIND: &'static str = "vault_capability";
}

impl CapabilityTarget for ServiceId {
    const CAPABILITY_KIND: &'static str = "service_capability";
}

/// An unforgeable capability over one target record.
///
/// The struct is only a handle: the ledger object with this id, held by
/// the sender and named in the target's guard, is what authorizes a
/// mutation. Entry points compare `target` with the record they are asked
/// to mutate before staging anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Capability<T: CapabilityTarget> {
    /// Capability object identifier.
    pub id: CapabilityId,
    /// The record this capability governs.
    pub target: T,
}

impl<T: CapabilityTarget> Capability<T> {
    pub(crate) fn mint(target: T) -> Self {
        Self {
            id: CapabilityId::new(),
            target,
        }
    }

    /// Whether this capability governs `target`.
    pub fn governs(&self, target: &T) -> bool {
        &self.target == target
    }
}

impl<T: CapabilityTarget> LedgerRecord for Capability<T> {
    const KIND: &'static str = T::CAPABILITY_KIND;
    fn object_id(&self) -> ObjectId {
        self.id.object_id()
    }
}

/// Capability over a vault.
pub type VaultCapability = Capability<VaultId>;

/// Capability over an OAuth service record.
pub type ServiceCapability = Capability<ServiceId>;

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn entry_is_active_strictly_before_deadline() {
        let e = AccessEntry {
            address: addr("0xs"),
            access_kind: AccessKind::View,
            expires_at: EpochMillis::new(100),
            grant_id: None,
        };
        assert!(e.is_active(EpochMillis::new(99)));
        assert!(!e.is_active(EpochMillis::new(100)));
        assert!(e.permits(&addr("0xS"), AccessKind::View, EpochMillis::new(0)));
        assert!(!e.permits(&addr("0xs"), AccessKind::Edit, EpochMillis::new(0)));
    }

    #[test]
    fn capability_kinds_are_distinct() {
        assert_eq!(<VaultCapability as LedgerRecord>::KIND, "vault_capability");
        assert_eq!(<ServiceCapability as LedgerRecord>::KIND, "service_capability");
    }

    #[test]
    fn capability_governs_only_its_target() {
        let v = VaultId::new();
        let cap = VaultCapability::mint(v);
        assert!(cap.governs(&v));
        assert!(!cap.governs(&VaultId::new()));
    }

    #[test]
    fn capability_decodes_from_its_json() {
        let cap = VaultCapability::mint(VaultId::new());
        let json = serde_json::to_value(&cap).unwrap();
        let back: VaultCapability = serde_json::from_value(json).unwrap();
        assert_eq!(back, cap);
    }

    #[test]
    fn direct_entry_omits_grant_tag() {
        let entry = AccessEntry {
            address: addr("0xs"),
            access_kind: AccessKind::View,
            expires_at: EpochMillis::new(100),
            grant_id: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("grant_id").is_none());
        let back: AccessEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn item_nonce_serializes_as_hex() {
        let item = Item {
            id: ItemId::new(),
            vault_id: VaultId::new(),
            name: "i".into(),
            access_kind: AccessKind::View,
            ciphertext_ref: BlobId::new("b1").unwrap(),
            nonce: vec![0xde, 0xad],
            allow_list: vec![],
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["nonce"], "dead");
    }

    #[test]
    fn empty_resource_kinds_accept_everything() {
        let mut svc = OAuthService {
            id: ServiceId::new(),
            client_id: "c".into(),
            owner: addr("0xs"),
            redirect_url: "https://svc.example/cb".into(),
            resource_kinds: BTreeSet::new(),
            created_at: EpochMillis::new(0),
        };
        assert!(svc.accepts(AccessKind::Delete));
        svc.resource_kinds.insert(AccessKind::View);
        assert!(!svc.accepts(AccessKind::Delete));
    }
}
