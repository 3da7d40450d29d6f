//! # Address Derivation
//!
//! An Ed25519 account address is `0x` followed by the hex SHA-256 of the
//! scheme flag byte (`0x00`) and the 32-byte public key. A credential that
//! claims an address is only accepted if its signing key derives to it.

use vaultgate_core::{sha256_bytes, Address};

use crate::ed25519::Ed25519PublicKey;

/// Signature-scheme flag for Ed25519 keys.
const ED25519_FLAG: u8 = 0x00;

/// Derive the ledger address controlled by an Ed25519 public key.
pub fn derive_address(public_key: &Ed25519PublicKey) -> Address {
    let mut preimage = Vec::with_capacity(33);
    preimage.push(ED25519_FLAG);
    preimage.extend_from_slice(public_key.as_bytes());
    Address::from_digest(&sha256_bytes(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ed25519::Ed25519KeyPair;

    #[test]
    fn derived_address_is_stable() {
        let kp = Ed25519KeyPair::from_seed(&[1u8; 32]);
        assert_eq!(derive_address(&kp.public_key()), derive_address(&kp.public_key()));
        assert_eq!(derive_address(&kp.public_key()).as_str().len(), 66);
    }

    #[test]
    fn different_keys_different_addresses() {
        let a = Ed25519KeyPair::from_seed(&[1u8; 32]).public_key();
        let b = Ed25519KeyPair::from_seed(&[2u8; 32]).public_key();
        assert_ne!(derive_address(&a), derive_address(&b));
    }
}
