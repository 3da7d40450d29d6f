//! # Ledger Objects and Typed Records
//!
//! The ledger stores every object in one shape. Typed access goes through
//! [`LedgerRecord`]: each record type names its kind and round-trips its
//! fields through serde. There is exactly one decoding path per kind.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vaultgate_core::{Address, ObjectId};

use crate::error::LedgerError;

/// Who may mutate an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Guard {
    /// Mutable by whoever presents this capability object while holding it.
    Capability(ObjectId),
    /// Mutable only by this address. Capabilities themselves carry this guard.
    Holder(Address),
    /// Never mutable after creation.
    Immutable,
}

/// A live ledger object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerObject {
    /// Object identifier.
    pub id: ObjectId,
    /// Record kind, e.g. `"vault"`.
    pub kind: String,
    /// Mutation guard.
    pub guard: Guard,
    /// Starts at 1 and increases on every committed mutation.
    pub version: u64,
    /// Record fields.
    pub fields: serde_json::Value,
}

impl LedgerObject {
    /// Decode this object as a typed record.
    pub fn decode<R: LedgerRecord>(&self) -> Result<R, LedgerError> {
        R::decode(self)
    }

    /// Address holding this object, if it is holder-guarded.
    pub fn holder(&self) -> Option<&Address> {
        match &self.guard {
            Guard::Holder(address) => Some(address),
            _ => None,
        }
    }
}

/// A record type stored on the ledger.
pub trait LedgerRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind tag stored alongside the fields.
    const KIND: &'static str;

    /// The ledger object identifier this record lives at.
    fn object_id(&self) -> ObjectId;

    /// Encode into ledger fields.
    fn encode(&self) -> Result<serde_json::Value, LedgerError> {
        serde_json::to_value(self).map_err(|e| LedgerError::Encode(e.to_string()))
    }

    /// Decode from a ledger object, checking kind and identity.
    fn decode(object: &LedgerObject) -> Result<Self, LedgerError> {
        if object.kind != Self::KIND {
            tracing::error!(
                object = %object.id,
                expected = Self::KIND,
                found = %object.kind,
                "ledger object kind mismatch"
            );
            return Err(LedgerError::KindMismatch {
                object: object.id,
                expected: Self::KIND.to_string(),
                found: object.kind.clone(),
            });
        }
        let record: Self = serde_json::from_value(object.fields.clone()).map_err(|e| {
            tracing::error!(object = %object.id, kind = Self::KIND, error = %e, "malformed ledger object");
            LedgerError::Malformed {
                object: object.id,
                reason: e.to_string(),
            }
        })?;
        if record.object_id() != object.id {
            tracing::error!(object = %object.id, kind = Self::KIND, "record id does not match object id");
            return Err(LedgerError::Malformed {
                object: object.id,
                reason: format!("record claims id {}", record.object_id()),
            });
        }
        Ok(record)
    }
}
