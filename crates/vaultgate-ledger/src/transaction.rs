//! # Atomic Transactions
//!
//! A [`Transaction`] is a list of staged operations sent by one address.
//! The ledger applies them in order against a private overlay and commits
//! the overlay only if every operation succeeds. Operations later in a
//! transaction see the effects of earlier ones, so a vault created in the
//! same transaction can be mutated by its freshly minted capability.
//!
//! Update closures run under the ledger's write lock. They may inspect the
//! current record, reject the whole transaction with an [`Abort`], or
//! mutate it. This is the only read-modify-write path the ledger offers.

use vaultgate_core::{Address, EpochMillis, FailureKind, ObjectId};

use crate::error::LedgerError;
use crate::object::{Guard, LedgerObject, LedgerRecord};

/// Authority presented for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Present a capability object. It must be named by the target's guard
    /// and held by the transaction sender.
    Capability(ObjectId),
    /// Act as the sender. The target must be held by the sender.
    Sender,
}

/// Rejection raised by a staged precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abort {
    /// Failure category surfaced to the caller.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl Abort {
    /// Create an abort of the given kind.
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

pub(crate) type UpdateFn = Box<dyn FnOnce(&mut LedgerObject) -> Result<(), LedgerError> + Send>;
pub(crate) type CheckFn = Box<dyn FnOnce(&LedgerObject) -> Result<(), LedgerError> + Send>;

pub(crate) enum Op {
    Create(LedgerObject),
    Update {
        id: ObjectId,
        authority: Authority,
        apply: UpdateFn,
    },
    Delete {
        id: ObjectId,
        authority: Authority,
        check: CheckFn,
    },
    Transfer {
        id: ObjectId,
        new_holder: Address,
    },
}

impl std::fmt::Debug for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(object) => write!(f, "Create({} {})", object.kind, object.id),
            Self::Update { id, authority, .. } => write!(f, "Update({id}, {authority:?})"),
            Self::Delete { id, authority, .. } => write!(f, "Delete({id}, {authority:?})"),
            Self::Transfer { id, new_holder } => write!(f, "Transfer({id} -> {new_holder})"),
        }
    }
}

/// A batch of operations committed atomically.
#[derive(Debug)]
pub struct Transaction {
    pub(crate) sender: Address,
    pub(crate) ops: Vec<Op>,
}

impl Transaction {
    /// Start a transaction sent by `sender`.
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            ops: Vec::new(),
        }
    }

    /// The sending address.
    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Stage creation of a record under the given guard.
    pub fn create<R: LedgerRecord>(&mut self, record: &R, guard: Guard) -> Result<&mut Self, LedgerError> {
        let fields = record.encode()?;
        self.ops.push(Op::Create(LedgerObject {
            id: record.object_id(),
            kind: R::KIND.to_string(),
            guard,
            version: 1,
            fields,
        }));
        Ok(self)
    }

    /// Stage a read-modify-write of a record.
    pub fn update<R, F>(&mut self, id: impl Into<ObjectId>, authority: Authority, f: F) -> &mut Self
    where
        R: LedgerRecord,
        F: FnOnce(&mut R) -> Result<(), Abort> + Send + 'static,
    {
        let id = id.into();
        self.ops.push(Op::Update {
            id,
            authority,
            apply: Box::new(move |object: &mut LedgerObject| {
                let mut record = R::decode(object)?;
                f(&mut record).map_err(|abort| aborted(id, abort))?;
                object.fields = record.encode()?;
                Ok(())
            }),
        });
        self
    }

    /// Stage deletion of a record.
    pub fn delete<R: LedgerRecord>(&mut self, id: impl Into<ObjectId>, authority: Authority) -> &mut Self {
        self.delete_if::<R, _>(id, authority, |_| Ok(()))
    }

    /// Stage deletion of a record, guarded by a precondition on its state.
    pub fn delete_if<R, F>(&mut self, id: impl Into<ObjectId>, authority: Authority, check: F) -> &mut Self
    where
        R: LedgerRecord,
        F: FnOnce(&R) -> Result<(), Abort> + Send + 'static,
    {
        let id = id.into();
        self.ops.push(Op::Delete {
            id,
            authority,
            check: Box::new(move |object: &LedgerObject| {
                let record = R::decode(object)?;
                check(&record).map_err(|abort| aborted(id, abort))
            }),
        });
        self
    }

    /// Stage a transfer of a holder-guarded object to another address.
    pub fn transfer(&mut self, id: impl Into<ObjectId>, new_holder: Address) -> &mut Self {
        self.ops.push(Op::Transfer {
            id: id.into(),
            new_holder,
        });
        self
    }
}

fn aborted(object: ObjectId, abort: Abort) -> LedgerError {
    LedgerError::Aborted {
        object,
        kind: abort.kind,
        reason: abort.reason,
    }
}

/// Summary of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxReceipt {
    /// Objects created.
    pub created: Vec<ObjectId>,
    /// Objects updated or transferred.
    pub mutated: Vec<ObjectId>,
    /// Objects deleted.
    pub deleted: Vec<ObjectId>,
    /// Ledger time of the commit.
    pub committed_at: EpochMillis,
}
