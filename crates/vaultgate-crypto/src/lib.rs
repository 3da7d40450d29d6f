//! # vaultgate-crypto: Cryptographic Primitives
//!
//! - **Ed25519** signing and verification over
//!   [`CanonicalBytes`](vaultgate_core::CanonicalBytes), used for session
//!   credential challenges and decryption-request signatures.
//! - **Address derivation** from an Ed25519 public key, so a signature can
//!   be checked against the address it claims to come from.
//! - **Bearer tokens**: 256-bit values from the OS CSPRNG, hex-encoded,
//!   compared in constant time.
//!
//! Private key material never implements `Serialize` and never appears in
//! `Debug` output.

pub mod address;
pub mod ed25519;
pub mod error;
pub mod token;

pub use address::derive_address;
pub use ed25519::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::CryptoError;
pub use token::BearerToken;
