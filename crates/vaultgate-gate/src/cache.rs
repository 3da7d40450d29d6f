//! TTL cache for ciphertext blobs.
//!
//! Blob identifiers are content-addressed, so a cached entry can never
//! go stale in content; the TTL only bounds memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use vaultgate_core::BlobId;

#[derive(Debug)]
struct CachedBlob {
    inserted: Instant,
    bytes: Arc<Vec<u8>>,
}

/// In-process blob cache shared by clones.
#[derive(Debug, Clone)]
pub struct BlobCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<BlobId, CachedBlob>>>,
}

impl BlobCache {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached bytes for `id`, if present and fresh.
    pub fn get(&self, id: &BlobId) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.read();
        entries
            .get(id)
            .filter(|entry| entry.inserted.elapsed() < self.ttl)
            .map(|entry| entry.bytes.clone())
    }

    /// Cache `bytes` under `id`, evicting stale entries.
    pub fn insert(&self, id: BlobId, bytes: Arc<Vec<u8>>) {
        let mut entries = self.entries.write();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted.elapsed() < ttl);
        entries.insert(
            id,
            CachedBlob {
                inserted: Instant::now(),
                bytes,
            },
        );
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
