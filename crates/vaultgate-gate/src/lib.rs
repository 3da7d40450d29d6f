//! # vaultgate-gate: Decryption Gate
//!
//! The read path that turns a session credential and an item reference
//! into plaintext, and only after the access decision engine allows it:
//!
//! ```text
//! validate credential → decide(View) → fetch ciphertext → bind artifact → oracle decrypt
//! ```
//!
//! The gate holds no key material. Ciphertext lives in a [`BlobStore`];
//! decryption is performed by a [`DecryptOracle`] that inspects a
//! [`DecryptionArtifact`] binding the encryption identity, vault, item and
//! requester, signed by the credential's session key.
//!
//! Every external call runs under an explicit timeout. The gate does not
//! retry; it classifies failures so callers can apply [`retry::with_retry`].

pub mod artifact;
pub mod blob;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod oracle;
pub mod publish;
pub mod retry;
pub mod session;

pub use artifact::DecryptionArtifact;
pub use blob::{BlobError, BlobStore, InMemoryBlobStore, Retention};
pub use cache::BlobCache;
pub use config::{ConfigError, GateConfig, IdentityMode};
pub use error::GateError;
pub use gate::{DecryptRequest, Decrypted, DecryptionGate};
pub use identity::{identity_strategy, EncryptionIdentity, IdentityStrategy, PerItemIdentity, PolicyIdentity};
pub use oracle::{DecryptOracle, EncryptOutput, LocalOracle, OracleError};
pub use publish::{DataPublisher, Publication};
pub use retry::{with_retry, RetryPolicy, Retryable};
pub use session::{exchange_for_session_credential, SessionCredential, Signed, Unsigned};
