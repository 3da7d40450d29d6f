//! # vaultgate-access: Delegated Access Control Plane
//!
//! The components that decide who may do what with a data item:
//!
//! - [`registry`]: vault and item lifecycle, gated by [`VaultCapability`].
//! - [`allow_list`]: per-address, per-kind, time-bounded entries on vaults
//!   and items.
//! - [`service`]: OAuth service registration, gated by [`ServiceCapability`].
//! - [`grant`]: the grant lifecycle and atomic issuance.
//! - [`decision`]: the pure access decision function and its ledger-backed
//!   wrapper.
//!
//! All state lives on the ledger. Every mutating entry point takes the
//! capability the caller presents and checks it against the target before
//! staging a transaction; the ledger checks it again on commit.

pub mod allow_list;
pub mod decision;
pub mod error;
pub mod grant;
pub mod records;
pub mod registry;
pub mod service;

pub use allow_list::{AccessScope, AllowListManager};
pub use decision::{evaluate, AccessDecisionEngine, AllowBasis, Decision, DenyReason, EntryScope, ResolvedDecision};
pub use error::AccessError;
pub use grant::{status_at, AuthorizationRequest, GrantIssuer, GrantStatus};
pub use records::{
    AccessEntry, Capability, CapabilityTarget, GrantedEntry, Item, OAuthGrant, OAuthService,
    ServiceCapability, Vault, VaultCapability,
};
pub use registry::{NewItem, VaultRegistry};
pub use service::{NewService, ServiceRegistry, ServiceUpdate};
