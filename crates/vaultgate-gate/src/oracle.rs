//! # Decrypt Oracle Contract
//!
//! The oracle holds (or coordinates threshold holders of) the key
//! material. It encrypts to an identity and decrypts only when shown a
//! [`DecryptionArtifact`] for that identity signed by a valid session.
//!
//! [`LocalOracle`] is a single-process stand-in used by tests and the
//! development server. It derives per-identity keys from a master secret
//! with SHA-256, simulates a key-server quorum, and supports injected
//! share failures.
//!
//! ## Ciphertext layout
//!
//! ```text
//! "VGC1" ‖ u16 BE identity length ‖ identity ‖ body ‖ 32-byte tag
//! ```

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use vaultgate_core::FailureKind;
use zeroize::Zeroizing;

use crate::artifact::DecryptionArtifact;
use crate::identity::EncryptionIdentity;
use crate::session::{SessionCredential, Signed};

const MAGIC: &[u8; 4] = b"VGC1";
const TAG_LEN: usize = 32;

/// Oracle failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Fewer key servers answered than the threshold requires.
    #[error("{responded} of {threshold} required key servers responded")]
    InsufficientShares {
        /// Servers that answered.
        responded: usize,
        /// Servers required.
        threshold: usize,
    },

    /// The artifact does not authorize this ciphertext.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// The ciphertext is truncated, tampered, or not ours.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// The oracle could not be reached.
    #[error("oracle unreachable: {0}")]
    Network(String),
}

impl OracleError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InsufficientShares { .. } => FailureKind::InsufficientShares,
            Self::InvalidArtifact(_) => FailureKind::InvalidArtifact,
            Self::InvalidCiphertext(_) => FailureKind::Validation,
            Self::Network(_) => FailureKind::NetworkError,
        }
    }
}

/// Result of encrypting to an identity.
pub struct EncryptOutput {
    /// Self-describing ciphertext.
    pub ciphertext: Vec<u8>,
    /// Symmetric key for offline recovery by the owner.
    pub backup_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for EncryptOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptOutput")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("backup_key", &"[REDACTED]")
            .finish()
    }
}

/// Identity-based encryption and artifact-gated decryption.
#[async_trait]
pub trait DecryptOracle: Send + Sync {
    /// Encrypt `plaintext` to `identity`.
    async fn encrypt(
        &self,
        identity: &EncryptionIdentity,
        plaintext: &[u8],
    ) -> Result<EncryptOutput, OracleError>;

    /// Decrypt `ciphertext` if `artifact` authorizes its identity.
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        artifact: &DecryptionArtifact,
        credential: &SessionCredential<Signed>,
    ) -> Result<Vec<u8>, OracleError>;

    /// Drop cached connections and key shares before a retry.
    fn reset(&self);
}

/// In-process oracle with a simulated key-server quorum.
pub struct LocalOracle {
    master: Zeroizing<[u8; 32]>,
    key_servers: usize,
    threshold: usize,
    unavailable: AtomicUsize,
    injected_failures: AtomicU32,
    resets: AtomicU32,
}

impl LocalOracle {
    /// Three key servers, threshold two.
    pub fn new(master_secret: [u8; 32]) -> Self {
        Self::with_quorum(master_secret, 3, 2)
    }

    /// Custom quorum. `threshold` is clamped to `1..=key_servers`.
    pub fn with_quorum(master_secret: [u8; 32], key_servers: usize, threshold: usize) -> Self {
        let key_servers = key_servers.max(1);
        Self {
            master: Zeroizing::new(master_secret),
            key_servers,
            threshold: threshold.clamp(1, key_servers),
            unavailable: AtomicUsize::new(0),
            injected_failures: AtomicU32::new(0),
            resets: AtomicU32::new(0),
        }
    }

    /// Mark `count` key servers as unreachable.
    pub fn set_unavailable_servers(&self, count: usize) {
        self.unavailable.store(count.min(self.key_servers), Ordering::SeqCst);
    }

    /// Make the next `count` decrypts fail with missing shares.
    pub fn fail_next(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// How many times [`DecryptOracle::reset`] ran.
    pub fn reset_count(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }

    fn identity_key(&self, identity: &[u8]) -> Zeroizing<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(b"vaultgate.identity-key");
        hasher.update(&self.master[..]);
        hasher.update(identity);
        Zeroizing::new(hasher.finalize().into())
    }

    fn check_quorum(&self) -> Result<(), OracleError> {
        let responded = self.key_servers - self.unavailable.load(Ordering::SeqCst);
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(OracleError::InsufficientShares {
                responded: self.threshold - 1,
                threshold: self.threshold,
            });
        }
        if responded < self.threshold {
            return Err(OracleError::InsufficientShares {
                responded,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalOracle")
            .field("master", &"[REDACTED]")
            .field("key_servers", &self.key_servers)
            .field("threshold", &self.threshold)
            .finish()
    }
}

fn apply_keystream(key: &[u8; 32], data: &mut [u8]) {
    for (counter, chunk) in data.chunks_mut(32).enumerate() {
        let mut hasher = Sha256::new();
        hasher.update(key);
        hasher.update((counter as u64).to_be_bytes());
        let block = hasher.finalize();
        for (byte, pad) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= pad;
        }
    }
}

fn tag(key: &[u8; 32], header: &[u8], body: &[u8]) -> [u8; TAG_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(b"vaultgate.tag");
    hasher.update(key);
    hasher.update(header);
    hasher.update(body);
    hasher.finalize().into()
}

struct Parsed<'a> {
    header: &'a [u8],
    identity: &'a [u8],
    body: &'a [u8],
    tag: &'a [u8],
}

fn parse(ciphertext: &[u8]) -> Result<Parsed<'_>, OracleError> {
    let short = || OracleError::InvalidCiphertext("truncated".into());
    if ciphertext.len() < MAGIC.len() + 2 + TAG_LEN || &ciphertext[..4] != MAGIC {
        return Err(OracleError::InvalidCiphertext("unrecognized format".into()));
    }
    let id_len = usize::from(u16::from_be_bytes([ciphertext[4], ciphertext[5]]));
    let header_end = 6 + id_len;
    let tag_start = ciphertext.len().checked_sub(TAG_LEN).ok_or_else(short)?;
    if header_end > tag_start {
        return Err(short());
    }
    Ok(Parsed {
        header: &ciphertext[..header_end],
        identity: &ciphertext[6..header_end],
        body: &ciphertext[header_end..tag_start],
        tag: &ciphertext[tag_start..],
    })
}

#[async_trait]
impl DecryptOracle for LocalOracle {
    async fn encrypt(
        &self,
        identity: &EncryptionIdentity,
        plaintext: &[u8],
    ) -> Result<EncryptOutput, OracleError> {
        let id = identity.as_bytes();
        let id_len = u16::try_from(id.len())
            .map_err(|_| OracleError::InvalidCiphertext("identity longer than 65535 bytes".into()))?;
        let key = self.identity_key(id);

        let mut out = Vec::with_capacity(6 + id.len() + plaintext.len() + TAG_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&id_len.to_be_bytes());
        out.extend_from_slice(id);
        let header_end = out.len();
        out.extend_from_slice(plaintext);
        apply_keystream(&key, &mut out[header_end..]);
        let mac = tag(&key, &out[..header_end], &out[header_end..]);
        out.extend_from_slice(&mac);

        Ok(EncryptOutput {
            ciphertext: out,
            backup_key: Zeroizing::new(key.to_vec()),
        })
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        artifact: &DecryptionArtifact,
        credential: &SessionCredential<Signed>,
    ) -> Result<Vec<u8>, OracleError> {
        let parsed = parse(ciphertext)?;
        artifact
            .verify(credential)
            .map_err(|e| OracleError::InvalidArtifact(e.to_string()))?;
        if parsed.identity != artifact.identity.as_bytes() {
            return Err(OracleError::InvalidArtifact(
                "artifact identity does not match ciphertext".into(),
            ));
        }
        self.check_quorum()?;

        let key = self.identity_key(parsed.identity);
        let expected = tag(&key, parsed.header, parsed.body);
        if !bool::from(expected[..].ct_eq(parsed.tag)) {
            return Err(OracleError::InvalidCiphertext("authentication tag mismatch".into()));
        }
        let mut plaintext = parsed.body.to_vec();
        apply_keystream(&key, &mut plaintext);
        Ok(plaintext)
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("local oracle reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultgate_core::{EpochMillis, ItemId, VaultId};
    use vaultgate_crypto::{derive_address, Ed25519KeyPair};

    fn credential() -> SessionCredential<Signed> {
        let wallet = Ed25519KeyPair::from_seed(&[5u8; 32]);
        SessionCredential::new(
            derive_address(&wallet.public_key()),
            "vaultgate/test",
            5,
            EpochMillis::new(0),
        )
        .unwrap()
        .sign(&wallet)
        .unwrap()
    }

    fn artifact_for(identity: &[u8], cred: &SessionCredential<Signed>) -> DecryptionArtifact {
        DecryptionArtifact::build(
            EncryptionIdentity::from_bytes(identity.to_vec()),
            VaultId::new(),
            ItemId::new(),
            cred,
            EpochMillis::new(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn decrypts_with_matching_artifact() {
        let oracle = LocalOracle::new([7u8; 32]);
        let identity = EncryptionIdentity::from_bytes(vec![1, 2, 3]);
        let sealed = oracle.encrypt(&identity, b"secret data").await.unwrap();
        assert_ne!(&sealed.ciphertext[6 + 3..6 + 3 + 11], b"secret data");

        let cred = credential();
        let plain = oracle
            .decrypt(&sealed.ciphertext, &artifact_for(&[1, 2, 3], &cred), &cred)
            .await
            .unwrap();
        assert_eq!(plain, b"secret data");
    }

    #[tokio::test]
    async fn artifact_for_other_identity_rejected() {
        let oracle = LocalOracle::new([7u8; 32]);
        let sealed = oracle
            .encrypt(&EncryptionIdentity::from_bytes(vec![1]), b"x")
            .await
            .unwrap();
        let cred = credential();
        let err = oracle
            .decrypt(&sealed.ciphertext, &artifact_for(&[2], &cred), &cred)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::InvalidArtifact(_)));
    }

    #[tokio::test]
    async fn tampered_body_rejected() {
        let oracle = LocalOracle::new([7u8; 32]);
        let mut sealed = oracle
            .encrypt(&EncryptionIdentity::from_bytes(vec![1]), b"hello")
            .await
            .unwrap();
        sealed.ciphertext[8] ^= 1;
        let cred = credential();
        let err = oracle
            .decrypt(&sealed.ciphertext, &artifact_for(&[1], &cred), &cred)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation);
    }

    #[tokio::test]
    async fn quorum_loss_is_insufficient_shares() {
        let oracle = LocalOracle::with_quorum([7u8; 32], 3, 2);
        let sealed = oracle
            .encrypt(&EncryptionIdentity::from_bytes(vec![1]), b"hello")
            .await
            .unwrap();
        let cred = credential();
        let artifact = artifact_for(&[1], &cred);

        oracle.set_unavailable_servers(2);
        let err = oracle.decrypt(&sealed.ciphertext, &artifact, &cred).await.unwrap_err();
        assert_eq!(err, OracleError::InsufficientShares { responded: 1, threshold: 2 });

        oracle.set_unavailable_servers(1);
        oracle.fail_next(1);
        assert!(oracle.decrypt(&sealed.ciphertext, &artifact, &cred).await.is_err());
        assert_eq!(oracle.decrypt(&sealed.ciphertext, &artifact, &cred).await.unwrap(), b"hello");
    }

    #[test]
    fn garbage_is_not_a_ciphertext() {
        assert!(parse(b"nope").is_err());
        assert!(parse(&[b'V', b'G', b'C', b'1', 0xff, 0xff].repeat(8)).is_err());
    }
}
