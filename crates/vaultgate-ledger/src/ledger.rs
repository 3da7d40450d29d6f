//! # Ledger Contract
//!
//! The async interface every ledger backend implements. Reads return
//! untyped [`LedgerObject`]s; [`load`] and [`load_optional`] decode them.

use async_trait::async_trait;
use vaultgate_core::{Address, EpochMillis, ObjectId};

use crate::error::LedgerError;
use crate::object::{LedgerObject, LedgerRecord};
use crate::transaction::{Transaction, TxReceipt};

/// A strongly-consistent object store with atomic, guard-checked
/// transactions and its own notion of current time.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Read an object by id.
    async fn get_object(&self, id: ObjectId) -> Result<LedgerObject, LedgerError>;

    /// Apply every staged operation, or none of them.
    async fn execute(&self, tx: Transaction) -> Result<TxReceipt, LedgerError>;

    /// Current ledger time.
    async fn now(&self) -> Result<EpochMillis, LedgerError>;

    /// Holder-guarded objects of `kind` held by `holder`.
    async fn owned_objects(&self, holder: &Address, kind: &str) -> Result<Vec<LedgerObject>, LedgerError>;

    /// Every live object of `kind`.
    async fn objects_of_kind(&self, kind: &str) -> Result<Vec<LedgerObject>, LedgerError>;
}

/// Read and decode a typed record.
pub async fn load<R: LedgerRecord>(
    ledger: &(impl Ledger + ?Sized),
    id: impl Into<ObjectId>,
) -> Result<R, LedgerError> {
    ledger.get_object(id.into()).await?.decode()
}

/// Read and decode a typed record, mapping absence to `None`.
pub async fn load_optional<R: LedgerRecord>(
    ledger: &(impl Ledger + ?Sized),
    id: impl Into<ObjectId>,
) -> Result<Option<R>, LedgerError> {
    match ledger.get_object(id.into()).await {
        Ok(object) => object.decode().map(Some),
        Err(LedgerError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
