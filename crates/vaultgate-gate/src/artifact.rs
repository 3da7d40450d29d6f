//! # Decryption Artifacts
//!
//! The authorization evidence handed to the decrypt oracle. It binds the
//! encryption identity to the vault, item and requester the access
//! decision was made for, and is signed by the credential's session key,
//! so an artifact built for one item cannot unlock another.

use serde::Serialize;
use vaultgate_core::{sha256_digest, Address, CanonicalBytes, ContentDigest, EpochMillis, ItemId, VaultId};
use vaultgate_crypto::{verify, Ed25519PublicKey, Ed25519Signature};

use crate::error::GateError;
use crate::identity::EncryptionIdentity;
use crate::session::{SessionCredential, Signed};

/// A session-signed binding of identity, vault, item and requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionArtifact {
    /// Identity the ciphertext was encrypted under.
    pub identity: EncryptionIdentity,
    /// Vault the item lives in.
    pub vault_id: VaultId,
    /// Item being decrypted.
    pub item_id: ItemId,
    /// Address the decision allowed.
    pub requester: Address,
    /// Session key that signed the artifact.
    pub session_public_key: Ed25519PublicKey,
    /// Ledger time the artifact was built at.
    pub issued_at: EpochMillis,
    /// Session-key signature over the binding.
    pub signature: Ed25519Signature,
}

#[derive(Serialize)]
struct Binding<'a> {
    identity: &'a EncryptionIdentity,
    issued_at: EpochMillis,
    item_id: ItemId,
    requester: &'a Address,
    session_public_key: Ed25519PublicKey,
    vault_id: VaultId,
}

impl DecryptionArtifact {
    /// Build and sign an artifact for `credential`'s address.
    pub fn build(
        identity: EncryptionIdentity,
        vault_id: VaultId,
        item_id: ItemId,
        credential: &SessionCredential<Signed>,
        issued_at: EpochMillis,
    ) -> Result<Self, GateError> {
        let requester = credential.address().clone();
        let session_public_key = credential.session_public_key();
        let bytes = CanonicalBytes::new(&Binding {
            identity: &identity,
            issued_at,
            item_id,
            requester: &requester,
            session_public_key,
            vault_id,
        })?;
        let signature = credential.sign_with_session_key(&bytes);
        Ok(Self {
            identity,
            vault_id,
            item_id,
            requester,
            session_public_key,
            issued_at,
            signature,
        })
    }

    /// Canonical bytes the session key signed.
    pub fn binding_bytes(&self) -> Result<CanonicalBytes, GateError> {
        Ok(CanonicalBytes::new(&Binding {
            identity: &self.identity,
            issued_at: self.issued_at,
            item_id: self.item_id,
            requester: &self.requester,
            session_public_key: self.session_public_key,
            vault_id: self.vault_id,
        })?)
    }

    /// SHA-256 of the binding, for audit logs.
    pub fn binding_digest(&self) -> Result<ContentDigest, GateError> {
        Ok(sha256_digest(&self.binding_bytes()?))
    }

    /// Check the artifact was produced by `credential` and is intact.
    pub fn verify(&self, credential: &SessionCredential<Signed>) -> Result<(), GateError> {
        if self.session_public_key != credential.session_public_key() {
            return Err(GateError::InvalidArtifact("artifact was signed by another session".into()));
        }
        if &self.requester != credential.address() {
            return Err(GateError::InvalidArtifact(format!(
                "artifact names requester {}, credential speaks for {}",
                self.requester,
                credential.address()
            )));
        }
        credential.verify_proof()?;
        verify(&self.binding_bytes()?, &self.signature, &self.session_public_key)
            .map_err(|e| GateError::InvalidArtifact(e.to_string()))
    }
}
