//! # Access Kinds
//!
//! The flat enumeration of access rights an allow-list entry can carry.
//! There is no hierarchy: holding `Edit` says nothing about `View`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kind of access granted to an address.
///
/// Discriminants are fixed (`View = 0`, `Edit = 1`, `Delete = 2`) because
/// they appear in ledger records and in the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Read the plaintext of a data item.
    View = 0,
    /// Replace the ciphertext of a data item.
    Edit = 1,
    /// Remove a data item.
    Delete = 2,
}

impl AccessKind {
    /// All access kinds, in discriminant order.
    pub const ALL: [AccessKind; 3] = [AccessKind::View, AccessKind::Edit, AccessKind::Delete];

    /// Numeric discriminant.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl TryFrom<u8> for AccessKind {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::View),
            1 => Ok(Self::Edit),
            2 => Ok(Self::Delete),
            other => Err(ValidationError::InvalidAccessKind(other)),
        }
    }
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(AccessKind::View.as_u8(), 0);
        assert_eq!(AccessKind::Edit.as_u8(), 1);
        assert_eq!(AccessKind::Delete.as_u8(), 2);
    }

    #[test]
    fn try_from_rejects_unknown() {
        assert_eq!(AccessKind::try_from(1).unwrap(), AccessKind::Edit);
        assert!(matches!(
            AccessKind::try_from(7),
            Err(ValidationError::InvalidAccessKind(7))
        ));
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&AccessKind::View).unwrap(), "\"view\"");
        let k: AccessKind = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(k, AccessKind::Delete);
    }
}
