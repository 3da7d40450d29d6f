//! # Identity Newtypes
//!
//! Identifiers for every record the ledger holds, plus the [`Address`]
//! type used for owners, grantees and credential holders.
//!
//! ## Validation
//!
//! UUID-based identifiers are valid by construction. Each converts to and
//! from the untyped [`ObjectId`] the ledger stores. [`Address`] validates
//! its format and is normalized to lowercase.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::digest::ContentDigest;
use crate::error::ValidationError;

/// Maximum number of characters after the `0x` prefix of an address.
const MAX_ADDRESS_BODY: usize = 64;

/// Untyped ledger object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a new random object identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an object identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Raw 16 bytes of the identifier, used in identity derivation.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! typed_object_id {
    ($(#[$doc:meta])* $ty:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(ObjectId);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(ObjectId::new())
            }

            /// Wrap an untyped ledger object identifier.
            pub fn from_object_id(id: ObjectId) -> Self {
                Self(id)
            }

            /// Parse an identifier from its hyphenated UUID form.
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(value.trim())
                    .map(|u| Self(ObjectId::from_uuid(u)))
                    .map_err(|_| ValidationError::InvalidIdentifier(value.to_string()))
            }

            /// The untyped ledger object identifier.
            pub fn object_id(&self) -> ObjectId {
                self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<$ty> for ObjectId {
            fn from(id: $ty) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_object_id!(
    /// Identifier of a data vault.
    VaultId
);
typed_object_id!(
    /// Identifier of a data item stored in a vault.
    ItemId
);
typed_object_id!(
    /// Identifier of a registered OAuth service.
    ServiceId
);
typed_object_id!(
    /// Identifier of an issued OAuth grant.
    GrantId
);
typed_object_id!(
    /// Identifier of a capability object (vault or service capability).
    CapabilityId
);

/// Opaque identifier of a blob in the content-addressed store.
///
/// The core never interprets it; the blob store decides its format.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Wrap a blob identifier, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "ciphertext_ref",
            });
        }
        Ok(Self(value))
    }

    /// Content address: the lowercase hex of the blob's digest.
    pub fn from_digest(digest: &ContentDigest) -> Self {
        Self(digest.to_hex())
    }

    /// The identifier as the store issued it.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An account address on the ledger.
///
/// Format: `0x` followed by 1-64 ASCII alphanumeric characters. Stored in
/// lowercase; `Address::new("0xAB")` and `Address::new("0xab")` are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address, validating and normalizing format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] if the value lacks the
    /// `0x` prefix, has an empty or over-long body, or contains characters
    /// other than ASCII letters and digits.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ValidationError::InvalidAddress(raw.clone()))?;
        if body.is_empty()
            || body.len() > MAX_ADDRESS_BODY
            || !body.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidAddress(raw));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Address whose body is the lowercase hex of a 32-byte digest.
    ///
    /// Used for addresses derived from public keys; always well-formed.
    pub fn from_digest(digest: &ContentDigest) -> Self {
        Self(format!("0x{}", digest.to_hex()))
    }

    /// Access the normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
