//! # Encryption Identity Derivation
//!
//! The encryption identity is the public label a ciphertext is bound to;
//! the decrypt oracle releases a key only for the identity named in a
//! signed artifact. Two schemes exist and a deployment picks one:
//!
//! - [`PerItemIdentity`]: `vault_id (16 bytes) ‖ nonce`. Each item has
//!   its own identity; the nonce is stored on the item.
//! - [`PolicyIdentity`]: one fixed identity for the whole deployment.
//!
//! Items encrypted under one scheme are not decryptable by a gate
//! configured for the other.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use vaultgate_core::VaultId;

use crate::config::IdentityMode;

/// Opaque identity bytes, hex on the wire.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncryptionIdentity(Vec<u8>);

impl EncryptionIdentity {
    /// Wrap raw identity bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw identity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for EncryptionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionIdentity({})", self.to_hex())
    }
}

impl std::fmt::Display for EncryptionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for EncryptionIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptionIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(Self).map_err(serde::de::Error::custom)
    }
}

/// Maps an item's location and nonce to its encryption identity.
pub trait IdentityStrategy: Send + Sync + std::fmt::Debug {
    /// Identity for an item in `vault_id` with `nonce`.
    fn derive(&self, vault_id: VaultId, nonce: &[u8]) -> EncryptionIdentity;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// `vault_id ‖ nonce`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerItemIdentity;

impl IdentityStrategy for PerItemIdentity {
    fn derive(&self, vault_id: VaultId, nonce: &[u8]) -> EncryptionIdentity {
        let vault = vault_id.object_id();
        let mut bytes = Vec::with_capacity(vault.as_bytes().len() + nonce.len());
        bytes.extend_from_slice(vault.as_bytes());
        bytes.extend_from_slice(nonce);
        EncryptionIdentity(bytes)
    }

    fn name(&self) -> &'static str {
        "per-item"
    }
}

/// The same configured identity for every item.
#[derive(Debug, Clone)]
pub struct PolicyIdentity {
    policy: EncryptionIdentity,
}

impl PolicyIdentity {
    /// Use `policy` as the deployment-wide identity.
    pub fn new(policy: Vec<u8>) -> Self {
        Self {
            policy: EncryptionIdentity(policy),
        }
    }
}

impl IdentityStrategy for PolicyIdentity {
    fn derive(&self, _vault_id: VaultId, _nonce: &[u8]) -> EncryptionIdentity {
        self.policy.clone()
    }

    fn name(&self) -> &'static str {
        "policy"
    }
}

/// Build the strategy a deployment is configured for.
pub fn identity_strategy(mode: &IdentityMode) -> Arc<dyn IdentityStrategy> {
    match mode {
        IdentityMode::PerItem => Arc::new(PerItemIdentity),
        IdentityMode::Policy(bytes) => Arc::new(PolicyIdentity::new(bytes.clone())),
    }
}
