//! # Bearer Tokens
//!
//! A bearer token is the correlation handle a service receives when a
//! grant is issued. It is not key material and is never sufficient on its
//! own to decrypt anything.
//!
//! ## Security Invariant
//!
//! - 256 bits from the OS CSPRNG. Never derived from time, addresses or
//!   any other predictable seed.
//! - Comparison is constant-time.
//! - `Debug` redacts the value.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

/// Length of a bearer token in bytes.
pub const TOKEN_BYTES: usize = 32;

/// A 256-bit random bearer token, hex-encoded on the wire.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    /// Generate a fresh token from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = zeroize::Zeroizing::new([0u8; TOKEN_BYTES]);
        rand::rngs::OsRng.fill_bytes(&mut bytes[..]);
        Self(hex::encode(&bytes[..]))
    }

    /// Parse a presented token, checking its encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidToken`] unless the value is exactly
    /// 64 hex characters.
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        let value = value.trim().to_ascii_lowercase();
        if value.len() != TOKEN_BYTES * 2 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidToken);
        }
        Ok(Self(value))
    }

    /// The hex-encoded token. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time equality against a presented token string.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.trim().as_bytes();
        if presented.len() != expected.len() {
            return false;
        }
        presented.ct_eq(expected).into()
    }
}

impl PartialEq for BearerToken {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for BearerToken {}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

impl Serialize for BearerToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BearerToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
