//! # vaultgate-ledger: Capability Ledger Contract
//!
//! The ledger is the only place vault, item, service and grant state lives.
//! This crate defines what the rest of vaultgate needs from it:
//!
//! - **Typed objects** ([`object`]): every object is stored as
//!   `{kind, guard, version, fields}` and decoded through a single
//!   [`LedgerRecord`] contract per record type. A shape or kind mismatch is
//!   a data-integrity error, never a defaulted value.
//!
//! - **Guards** ([`Guard`]): an object is mutable only by whoever presents
//!   the capability object named in its guard, or by the address holding it.
//!
//! - **Transactions** ([`transaction`]): creates, updates, deletes and
//!   transfers staged on a [`Transaction`] commit all-or-nothing.
//!
//! - **Time** ([`clock`]): ledger time is read from an injectable [`Clock`]
//!   so expiry tests can advance it deterministically.
//!
//! [`InMemoryLedger`] implements the contract with a single `parking_lot`
//! lock; it is the ledger used by the API binary and every test.

pub mod clock;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod object;
pub mod transaction;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LedgerError;
pub use ledger::{load, load_optional, Ledger};
pub use memory::InMemoryLedger;
pub use object::{Guard, LedgerObject, LedgerRecord};
pub use transaction::{Abort, Authority, Transaction, TxReceipt};
