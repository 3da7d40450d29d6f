#![deny(missing_docs)]

//! # vaultgate-core: Foundational Types for vaultgate
//!
//! This crate defines the types that every other crate in the workspace
//! depends on. It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** [`VaultId`], [`ItemId`],
//!    [`ServiceId`], [`GrantId`] and [`CapabilityId`] are distinct types.
//!    You cannot pass an item identifier where a vault identifier is expected.
//!
//! 2. **[`Address`] is validated at construction.** Addresses are
//!    normalized to lowercase so equality checks in the access engine
//!    never depend on caller formatting.
//!
//! 3. **[`AccessKind`] is a flat enum.** `Edit` does not imply `View`.
//!
//! 4. **[`CanonicalBytes`] is the sole input to signing and binding digests.**
//!    Challenge messages and decryption artifacts are canonicalized before
//!    they are signed or hashed.
//!
//! 5. **[`FailureKind`] is the single failure taxonomy.** Every error type in
//!    the workspace maps onto it, so callers branch on a machine-checkable
//!    kind rather than on message text.

pub mod access;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use access::AccessKind;
pub use canonical::CanonicalBytes;
pub use digest::{sha256_bytes, sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, FailureKind, ValidationError};
pub use identity::{Address, BlobId, CapabilityId, GrantId, ItemId, ObjectId, ServiceId, VaultId};
pub use temporal::{EpochMillis, MILLIS_PER_MINUTE};
