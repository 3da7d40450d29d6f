//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Everything here is cheap to clone.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use rand::RngCore;
use vaultgate_access::GrantIssuer;
use vaultgate_gate::{BlobStore, DecryptOracle, DecryptionGate, InMemoryBlobStore, LocalOracle, RetryPolicy};
use vaultgate_ledger::{InMemoryLedger, Ledger};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Ledger all control-plane state lives on.
    pub ledger: Arc<dyn Ledger>,
    /// The decryption gate.
    pub gate: DecryptionGate,
    /// Grant lookup for introspection.
    pub grants: GrantIssuer,
    /// Retry policy applied around gate calls.
    pub retry: RetryPolicy,
    /// Prometheus exposition handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Assemble state from explicit collaborators.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        blobs: Arc<dyn BlobStore>,
        oracle: Arc<dyn DecryptOracle>,
        config: &ApiConfig,
    ) -> Self {
        Self {
            gate: DecryptionGate::new(Arc::clone(&ledger), blobs, oracle, &config.gate),
            grants: GrantIssuer::new(Arc::clone(&ledger)),
            retry: config.gate.retry,
            ledger,
            metrics: None,
        }
    }

    /// In-memory ledger and blob store with a local oracle.
    pub fn in_memory(config: &ApiConfig) -> Self {
        let secret = match &config.oracle_secret {
            Some(secret) => **secret,
            None => {
                tracing::warn!("VAULTGATE_ORACLE_SECRET not set, generating an ephemeral oracle secret");
                ephemeral_secret()
            }
        };
        Self::new(
            Arc::new(InMemoryLedger::with_system_clock()),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(LocalOracle::new(secret)),
            config,
        )
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

fn ephemeral_secret() -> [u8; 32] {
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gate", &self.gate)
            .field("retry", &self.retry)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
