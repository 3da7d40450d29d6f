//! # Blob Store Contract
//!
//! A content-addressed, replicated store for ciphertext. Writes return an
//! opaque [`BlobId`]; reads may briefly fail with `NotFound` or
//! `NotEnoughReplicas` right after a write while replication catches up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use vaultgate_core::{sha256_bytes, BlobId, FailureKind};

/// How long and how strictly the store keeps a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// Storage epochs to retain the blob for.
    pub epochs: u32,
    /// Whether the owner may delete it before the epochs elapse.
    pub deletable: bool,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            epochs: 1,
            deletable: true,
        }
    }
}

/// Blob store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// No blob with this identifier is visible.
    #[error("blob {0} not found")]
    NotFound(String),

    /// Too few storage nodes hold the blob to reconstruct it.
    #[error("not enough replicas for blob {0}")]
    NotEnoughReplicas(String),

    /// The store could not be reached.
    #[error("blob store unreachable: {0}")]
    Network(String),
}

impl BlobError {
    /// Failure category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::NotEnoughReplicas(_) | Self::Network(_) => FailureKind::NetworkError,
        }
    }
}

/// Content-addressed ciphertext storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return their identifier.
    async fn write(&self, bytes: Vec<u8>, retention: Retention) -> Result<BlobId, BlobError>;

    /// Read the bytes stored under `id`.
    async fn read(&self, id: &BlobId) -> Result<Vec<u8>, BlobError>;
}

#[derive(Debug)]
struct StoredBlob {
    bytes: Arc<Vec<u8>>,
    retention: Retention,
    pending_reads: u32,
}

/// In-memory blob store keyed by the SHA-256 of the content.
///
/// `with_read_lag(n)` makes the first `n` reads after a write report
/// `NotFound`, imitating replication delay.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<BlobId, StoredBlob>>>,
    read_lag: u32,
}

impl InMemoryBlobStore {
    /// An empty store with no replication delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store whose fresh blobs stay invisible for `reads` reads.
    pub fn with_read_lag(reads: u32) -> Self {
        Self {
            read_lag: reads,
            ..Self::default()
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retention recorded for `id`.
    pub fn retention(&self, id: &BlobId) -> Option<Retention> {
        self.blobs.read().get(id).map(|blob| blob.retention)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(&self, bytes: Vec<u8>, retention: Retention) -> Result<BlobId, BlobError> {
        let id = BlobId::from_digest(&sha256_bytes(&bytes));
        let mut blobs = self.blobs.write();
        blobs.entry(id.clone()).or_insert_with(|| StoredBlob {
            bytes: Arc::new(bytes),
            retention,
            pending_reads: self.read_lag,
        });
        tracing::debug!(blob = %id, "blob stored");
        Ok(id)
    }

    async fn read(&self, id: &BlobId) -> Result<Vec<u8>, BlobError> {
        let mut blobs = self.blobs.write();
        let blob = blobs
            .get_mut(id)
            .ok_or_else(|| BlobError::NotFound(id.to_string()))?;
        if blob.pending_reads > 0 {
            blob.pending_reads -= 1;
            return Err(BlobError::NotFound(id.to_string()));
        }
        Ok(blob.bytes.as_ref().clone())
    }
}
