//! Decryption gate configuration.
//!
//! Every external collaborator call is bounded by `external_timeout`.
//! Override any value via environment variables or construct directly
//! for tests.

use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::session::DEFAULT_CLOCK_SKEW;

/// Default deadline for blob-store, oracle and ledger reads (5 minutes).
pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 300;

/// Default bound on concurrent oracle calls in a batch.
pub const DEFAULT_MAX_CONCURRENT_DECRYPTS: usize = 3;

/// Default domain-separation context for session credentials.
pub const DEFAULT_DOMAIN: &str = "vaultgate/v1";

/// Which encryption-identity scheme a deployment uses.
///
/// Mixing schemes within one deployment is unsupported: items encrypted
/// under one scheme cannot be decrypted by a gate configured for the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMode {
    /// `vault_id ‖ nonce`, unique per item.
    PerItem,
    /// One fixed identity shared by every item.
    Policy(Vec<u8>),
}

impl IdentityMode {
    /// Parse `per-item` or `policy:<hex>`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("per-item") {
            return Ok(Self::PerItem);
        }
        let bytes = value
            .strip_prefix("policy:")
            .and_then(|hex_id| hex::decode(hex_id).ok())
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ConfigError::InvalidIdentityMode(value.to_string()))?;
        Ok(Self::Policy(bytes))
    }
}

/// Configuration for the decryption gate and data publisher.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Deadline for each external call.
    pub external_timeout: Duration,
    /// Maximum oracle calls in flight for one batch.
    pub max_concurrent_decrypts: usize,
    /// Caller-side retry policy.
    pub retry: RetryPolicy,
    /// Encryption-identity scheme.
    pub identity_mode: IdentityMode,
    /// Domain-separation context bound into session credentials.
    pub domain: String,
    /// Blob cache lifetime. `None` disables the cache.
    pub blob_cache_ttl: Option<Duration>,
    /// How far a credential's creation time may lead ledger time.
    pub clock_skew: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            external_timeout: Duration::from_secs(DEFAULT_EXTERNAL_TIMEOUT_SECS),
            max_concurrent_decrypts: DEFAULT_MAX_CONCURRENT_DECRYPTS,
            retry: RetryPolicy::default(),
            identity_mode: IdentityMode::PerItem,
            domain: DEFAULT_DOMAIN.to_string(),
            blob_cache_ttl: None,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `VAULTGATE_EXTERNAL_TIMEOUT_SECS` (default: 300)
    /// - `VAULTGATE_MAX_CONCURRENT_DECRYPTS` (default: 3)
    /// - `VAULTGATE_RETRY_ATTEMPTS` (retries after the first call, default: 2)
    /// - `VAULTGATE_RETRY_BASE_DELAY_MS` (default: 200)
    /// - `VAULTGATE_IDENTITY_MODE` (`per-item` or `policy:<hex>`, default: `per-item`)
    /// - `VAULTGATE_DOMAIN` (default: `vaultgate/v1`)
    /// - `VAULTGATE_BLOB_CACHE_TTL_SECS` (0 disables, default: 0)
    /// - `VAULTGATE_CLOCK_SKEW_SECS` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeout_secs = env_number(&lookup, "VAULTGATE_EXTERNAL_TIMEOUT_SECS", DEFAULT_EXTERNAL_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Zero("VAULTGATE_EXTERNAL_TIMEOUT_SECS"));
        }
        let max_concurrent = env_number(
            &lookup,
            "VAULTGATE_MAX_CONCURRENT_DECRYPTS",
            DEFAULT_MAX_CONCURRENT_DECRYPTS as u64,
        )?;
        if max_concurrent == 0 {
            return Err(ConfigError::Zero("VAULTGATE_MAX_CONCURRENT_DECRYPTS"));
        }
        let max_retries = env_number(&lookup, "VAULTGATE_RETRY_ATTEMPTS", u64::from(defaults.retry.max_retries))?;
        let base_delay_ms = env_number(
            &lookup,
            "VAULTGATE_RETRY_BASE_DELAY_MS",
            defaults.retry.base_delay.as_millis() as u64,
        )?;
        let identity_mode = match lookup("VAULTGATE_IDENTITY_MODE") {
            Some(raw) => IdentityMode::parse(&raw)?,
            None => IdentityMode::PerItem,
        };
        let domain = lookup("VAULTGATE_DOMAIN")
            .map(|d| d.trim().to_string())
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        if domain.is_empty() {
            return Err(ConfigError::Zero("VAULTGATE_DOMAIN"));
        }
        let cache_secs = env_number(&lookup, "VAULTGATE_BLOB_CACHE_TTL_SECS", 0)?;
        let skew_secs = env_number(&lookup, "VAULTGATE_CLOCK_SKEW_SECS", defaults.clock_skew.as_secs())?;

        Ok(Self {
            external_timeout: Duration::from_secs(timeout_secs),
            max_concurrent_decrypts: max_concurrent as usize,
            retry: RetryPolicy {
                max_retries: u32::try_from(max_retries)
                    .map_err(|_| ConfigError::InvalidNumber {
                        var: "VAULTGATE_RETRY_ATTEMPTS",
                        value: max_retries.to_string(),
                    })?,
                base_delay: Duration::from_millis(base_delay_ms),
            },
            identity_mode,
            domain,
            blob_cache_ttl: (cache_secs > 0).then(|| Duration::from_secs(cache_secs)),
            clock_skew: Duration::from_secs(skew_secs),
        })
    }
}

fn env_number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric variable did not parse.
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A variable that must be positive or non-empty was not.
    #[error("{0} must not be zero or empty")]
    Zero(&'static str),

    /// `VAULTGATE_IDENTITY_MODE` is neither `per-item` nor `policy:<hex>`.
    #[error("invalid identity mode {0:?}: expected `per-item` or `policy:<hex>`")]
    InvalidIdentityMode(String),

    /// A secret variable is not valid hex of the right length.
    #[error("{0} must be 64 hex characters")]
    InvalidSecret(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = GateConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.external_timeout, Duration::from_secs(300));
        assert_eq!(config.max_concurrent_decrypts, 3);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay, Duration::from_millis(200));
        assert_eq!(config.identity_mode, IdentityMode::PerItem);
        assert_eq!(config.domain, "vaultgate/v1");
        assert!(config.blob_cache_ttl.is_none());
        assert_eq!(config.clock_skew, Duration::from_secs(60));
    }

    #[test]
    fn overrides_are_read() {
        let config = GateConfig::from_lookup(lookup(&[
            ("VAULTGATE_EXTERNAL_TIMEOUT_SECS", "5"),
            ("VAULTGATE_MAX_CONCURRENT_DECRYPTS", "8"),
            ("VAULTGATE_IDENTITY_MODE", "policy:c0ffee"),
            ("VAULTGATE_BLOB_CACHE_TTL_SECS", "60"),
            ("VAULTGATE_CLOCK_SKEW_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.clock_skew, Duration::ZERO);
        assert_eq!(config.external_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_decrypts, 8);
        assert_eq!(config.identity_mode, IdentityMode::Policy(vec![0xc0, 0xff, 0xee]));
        assert_eq!(config.blob_cache_ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn bad_values_are_typed_errors() {
        assert!(matches!(
            GateConfig::from_lookup(lookup(&[("VAULTGATE_MAX_CONCURRENT_DECRYPTS", "lots")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            GateConfig::from_lookup(lookup(&[("VAULTGATE_MAX_CONCURRENT_DECRYPTS", "0")])),
            Err(ConfigError::Zero(_))
        ));
        assert!(matches!(
            GateConfig::from_lookup(lookup(&[("VAULTGATE_IDENTITY_MODE", "policy:")])),
            Err(ConfigError::InvalidIdentityMode(_))
        ));
        assert!(matches!(
            GateConfig::from_lookup(lookup(&[("VAULTGATE_IDENTITY_MODE", "global")])),
            Err(ConfigError::InvalidIdentityMode(_))
        ));
    }
}
