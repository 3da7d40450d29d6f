//! # In-Memory Ledger
//!
//! A strongly-consistent ledger backed by one `parking_lot::RwLock`.
//! Transactions are applied to an overlay while the write lock is held and
//! merged only on success, so readers never observe a partial commit.
//! The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use vaultgate_core::{Address, EpochMillis, ObjectId};

use crate::clock::{Clock, SystemClock};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::object::{Guard, LedgerObject};
use crate::transaction::{Authority, Op, Transaction, TxReceipt};

/// Thread-safe, cloneable in-memory ledger. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    objects: Arc<RwLock<HashMap<ObjectId, LedgerObject>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    /// Create an empty ledger reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Create an empty ledger on wall-clock time.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the ledger holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(
        base: &HashMap<ObjectId, LedgerObject>,
        sender: &Address,
        ops: Vec<Op>,
    ) -> Result<(HashMap<ObjectId, Option<LedgerObject>>, TxReceipt), LedgerError> {
        let mut overlay = Overlay {
            base,
            changes: HashMap::new(),
        };
        let mut receipt = TxReceipt::default();

        for op in ops {
            match op {
                Op::Create(object) => {
                    if overlay.get(&object.id).is_some() {
                        return Err(LedgerError::AlreadyExists(object.id));
                    }
                    receipt.created.push(object.id);
                    overlay.put(object);
                }
                Op::Update { id, authority, apply } => {
                    let mut object = overlay.get(&id).cloned().ok_or(LedgerError::NotFound(id))?;
                    overlay.authorize(&object, authority, sender)?;
                    apply(&mut object)?;
                    object.version += 1;
                    receipt.mutated.push(id);
                    overlay.put(object);
                }
                Op::Delete { id, authority, check } => {
                    let object = overlay.get(&id).ok_or(LedgerError::NotFound(id))?;
                    overlay.authorize(object, authority, sender)?;
                    check(object)?;
                    receipt.deleted.push(id);
                    overlay.remove(id);
                }
                Op::Transfer { id, new_holder } => {
                    let mut object = overlay.get(&id).cloned().ok_or(LedgerError::NotFound(id))?;
                    overlay.authorize(&object, Authority::Sender, sender)?;
                    object.guard = Guard::Holder(new_holder);
                    object.version += 1;
                    receipt.mutated.push(id);
                    overlay.put(object);
                }
            }
        }
        Ok((overlay.changes, receipt))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

/// Uncommitted view: staged changes layered over the committed objects.
/// `None` marks a staged deletion.
struct Overlay<'a> {
    base: &'a HashMap<ObjectId, LedgerObject>,
    changes: HashMap<ObjectId, Option<LedgerObject>>,
}

impl Overlay<'_> {
    fn get(&self, id: &ObjectId) -> Option<&LedgerObject> {
        match self.changes.get(id) {
            Some(staged) => staged.as_ref(),
            None => self.base.get(id),
        }
    }

    fn put(&mut self, object: LedgerObject) {
        self.changes.insert(object.id, Some(object));
    }

    fn remove(&mut self, id: ObjectId) {
        self.changes.insert(id, None);
    }

    fn authorize(&self, target: &LedgerObject, authority: Authority, sender: &Address) -> Result<(), LedgerError> {
        let deny = |reason: String| LedgerError::Unauthorized {
            object: target.id,
            reason,
        };
        match (&target.guard, authority) {
            (Guard::Immutable, _) => Err(deny("object is immutable".into())),
            (Guard::Holder(holder), Authority::Sender) => {
                if holder == sender {
                    Ok(())
                } else {
                    Err(deny(format!("held by another address, not {sender}")))
                }
            }
            (Guard::Holder(_), Authority::Capability(_)) => {
                Err(deny("holder-guarded object cannot be mutated through a capability".into()))
            }
            (Guard::Capability(_), Authority::Sender) => {
                Err(deny("capability-guarded object requires a capability".into()))
            }
            (Guard::Capability(required), Authority::Capability(presented)) => {
                if *required != presented {
                    return Err(deny(format!("capability {presented} does not govern this object")));
                }
                let capability = self
                    .get(&presented)
                    .ok_or_else(|| deny(format!("capability {presented} does not exist")))?;
                match capability.holder() {
                    Some(holder) if holder == sender => Ok(()),
                    _ => Err(deny(format!("capability {presented} is not held by {sender}"))),
                }
            }
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn get_object(&self, id: ObjectId) -> Result<LedgerObject, LedgerError> {
        self.objects.read().get(&id).cloned().ok_or(LedgerError::NotFound(id))
    }

    async fn execute(&self, tx: Transaction) -> Result<TxReceipt, LedgerError> {
        let Transaction { sender, ops } = tx;
        let op_count = ops.len();
        let mut guard = self.objects.write();
        let (changes, mut receipt) = match Self::apply(&guard, &sender, ops) {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!(sender = %sender, ops = op_count, error = %e, "ledger transaction rejected");
                return Err(e);
            }
        };
        for (id, staged) in changes {
            match staged {
                Some(object) => {
                    guard.insert(id, object);
                }
                None => {
                    guard.remove(&id);
                }
            }
        }
        drop(guard);
        receipt.committed_at = self.clock.now();
        tracing::info!(
            sender = %sender,
            created = receipt.created.len(),
            mutated = receipt.mutated.len(),
            deleted = receipt.deleted.len(),
            "ledger transaction committed"
        );
        Ok(receipt)
    }

    async fn now(&self) -> Result<EpochMillis, LedgerError> {
        Ok(self.clock.now())
    }

    async fn owned_objects(&self, holder: &Address, kind: &str) -> Result<Vec<LedgerObject>, LedgerError> {
        let mut owned: Vec<LedgerObject> = self
            .objects
            .read()
            .values()
            .filter(|o| o.kind == kind && o.holder() == Some(holder))
            .cloned()
            .collect();
        owned.sort_by_key(|o| o.id);
        Ok(owned)
    }

    async fn objects_of_kind(&self, kind: &str) -> Result<Vec<LedgerObject>, LedgerError> {
        let mut objects: Vec<LedgerObject> = self
            .objects
            .read()
            .values()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect();
        objects.sort_by_key(|o| o.id);
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ledger::{load, load_optional};
    use crate::object::tests::Note;
    use crate::object::LedgerRecord;
    use crate::transaction::Abort;
    use serde::{Deserialize, Serialize};
    use vaultgate_core::FailureKind;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Key {
        id: ObjectId,
        target: ObjectId,
    }

    impl LedgerRecord for Key {
        const KIND: &'static str = "key";
        fn object_id(&self) -> ObjectId {
            self.id
        }
    }

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    /// Creates a note guarded by a key held by `holder`.
    async fn seed(ledger: &InMemoryLedger, holder: &Address) -> (Note, Key) {
        let note = Note {
            id: ObjectId::new(),
            text: "v1".into(),
        };
        let key = Key {
            id: ObjectId::new(),
            target: note.id,
        };
        let mut tx = Transaction::new(holder.clone());
        tx.create(&key, Guard::Holder(holder.clone())).unwrap();
        tx.create(&note, Guard::Capability(key.id)).unwrap();
        ledger.execute(tx).await.unwrap();
        (note, key)
    }

    fn set_text(text: &'static str) -> impl FnOnce(&mut Note) -> Result<(), Abort> + Send {
        move |n: &mut Note| {
            n.text = text.into();
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_and_read_back() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let (note, key) = seed(&ledger, &owner).await;
        assert_eq!(load::<Note>(&ledger, note.id).await.unwrap(), note);
        let obj = ledger.get_object(key.id).await.unwrap();
        assert_eq!(obj.holder(), Some(&owner));
        assert_eq!(obj.version, 1);
    }

    #[tokio::test]
    async fn update_with_held_capability_bumps_version() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let (note, key) = seed(&ledger, &owner).await;
        let mut tx = Transaction::new(owner);
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), set_text("v2"));
        ledger.execute(tx).await.unwrap();
        let obj = ledger.get_object(note.id).await.unwrap();
        assert_eq!(obj.version, 2);
        assert_eq!(obj.decode::<Note>().unwrap().text, "v2");
    }

    #[tokio::test]
    async fn capability_held_by_someone_else_is_unauthorized() {
        let ledger = InMemoryLedger::default();
        let (note, key) = seed(&ledger, &addr("0xa1")).await;
        let mut tx = Transaction::new(addr("0xb2"));
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), set_text("stolen"));
        let err = ledger.execute(tx).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Unauthorized);
        assert_eq!(load::<Note>(&ledger, note.id).await.unwrap().text, "v1");
    }

    #[tokio::test]
    async fn capability_for_other_object_is_unauthorized() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let (note_a, _) = seed(&ledger, &owner).await;
        let (_, key_b) = seed(&ledger, &owner).await;
        let mut tx = Transaction::new(owner);
        tx.update::<Note, _>(note_a.id, Authority::Capability(key_b.id), set_text("x"));
        assert!(matches!(
            ledger.execute(tx).await,
            Err(LedgerError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn failed_op_rolls_back_whole_transaction() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let (note, key) = seed(&ledger, &owner).await;
        let extra = Note {
            id: ObjectId::new(),
            text: "extra".into(),
        };
        let mut tx = Transaction::new(owner);
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), set_text("changed"));
        tx.create(&extra, Guard::Immutable).unwrap();
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), |_| {
            Err(Abort::new(FailureKind::InvalidExpiry, "deadline in the past"))
        });
        let err = ledger.execute(tx).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidExpiry);
        assert_eq!(load::<Note>(&ledger, note.id).await.unwrap().text, "v1");
        assert!(load_optional::<Note>(&ledger, extra.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_ops_see_earlier_ops() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let note = Note {
            id: ObjectId::new(),
            text: "a".into(),
        };
        let key = Key {
            id: ObjectId::new(),
            target: note.id,
        };
        let mut tx = Transaction::new(owner.clone());
        tx.create(&key, Guard::Holder(owner.clone())).unwrap();
        tx.create(&note, Guard::Capability(key.id)).unwrap();
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), set_text("b"));
        let receipt = ledger.execute(tx).await.unwrap();
        assert_eq!(receipt.created.len(), 2);
        assert_eq!(receipt.mutated, vec![note.id]);
        assert_eq!(load::<Note>(&ledger, note.id).await.unwrap().text, "b");
    }

    #[tokio::test]
    async fn delete_if_checks_precondition() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let (note, key) = seed(&ledger, &owner).await;
        let mut tx = Transaction::new(owner.clone());
        tx.delete_if::<Note, _>(note.id, Authority::Capability(key.id), |n| {
            if n.text.is_empty() {
                Ok(())
            } else {
                Err(Abort::new(FailureKind::VaultNotEmpty, "not empty"))
            }
        });
        assert_eq!(
            ledger.execute(tx).await.unwrap_err().kind(),
            FailureKind::VaultNotEmpty
        );

        let mut tx = Transaction::new(owner);
        tx.delete::<Note>(note.id, Authority::Capability(key.id));
        tx.delete::<Key>(key.id, Authority::Sender);
        ledger.execute(tx).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn transfer_moves_mutation_rights() {
        let ledger = InMemoryLedger::default();
        let (alice, bob) = (addr("0xa1"), addr("0xb2"));
        let (note, key) = seed(&ledger, &alice).await;

        let mut tx = Transaction::new(alice.clone());
        tx.transfer(key.id, bob.clone());
        ledger.execute(tx).await.unwrap();

        let mut tx = Transaction::new(alice.clone());
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), set_text("alice"));
        assert!(ledger.execute(tx).await.is_err());

        let mut tx = Transaction::new(bob.clone());
        tx.update::<Note, _>(note.id, Authority::Capability(key.id), set_text("bob"));
        ledger.execute(tx).await.unwrap();

        assert!(ledger.owned_objects(&alice, "key").await.unwrap().is_empty());
        assert_eq!(ledger.owned_objects(&bob, "key").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn immutable_objects_reject_all_mutation() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let note = Note {
            id: ObjectId::new(),
            text: "fixed".into(),
        };
        let mut tx = Transaction::new(owner.clone());
        tx.create(&note, Guard::Immutable).unwrap();
        ledger.execute(tx).await.unwrap();

        let mut tx = Transaction::new(owner);
        tx.delete::<Note>(note.id, Authority::Sender);
        assert_eq!(
            ledger.execute(tx).await.unwrap_err().kind(),
            FailureKind::Unauthorized
        );
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        let (note, _) = seed(&ledger, &owner).await;
        let mut tx = Transaction::new(owner);
        tx.create(&note, Guard::Immutable).unwrap();
        assert!(matches!(
            ledger.execute(tx).await,
            Err(LedgerError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn receipt_uses_ledger_clock() {
        let clock = ManualClock::new(EpochMillis::new(42_000));
        let ledger = InMemoryLedger::new(Arc::new(clock.clone()));
        let owner = addr("0xa1");
        let mut tx = Transaction::new(owner);
        tx.create(
            &Note {
                id: ObjectId::new(),
                text: "t".into(),
            },
            Guard::Immutable,
        )
        .unwrap();
        let receipt = ledger.execute(tx).await.unwrap();
        assert_eq!(receipt.committed_at, EpochMillis::new(42_000));
        clock.advance_minutes(1);
        assert_eq!(ledger.now().await.unwrap(), EpochMillis::new(102_000));
    }

    #[tokio::test]
    async fn objects_of_kind_filters() {
        let ledger = InMemoryLedger::default();
        let owner = addr("0xa1");
        seed(&ledger, &owner).await;
        seed(&ledger, &owner).await;
        assert_eq!(ledger.objects_of_kind("note").await.unwrap().len(), 2);
        assert_eq!(ledger.objects_of_kind("key").await.unwrap().len(), 2);
        assert!(ledger.objects_of_kind("vault").await.unwrap().is_empty());
    }
}
