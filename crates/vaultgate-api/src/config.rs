//! API server configuration.
//!
//! Wraps the gate's [`GateConfig`] with the listener port and, for the
//! development server, the local oracle's master secret.

use vaultgate_gate::{ConfigError, GateConfig};
use zeroize::Zeroizing;

/// Default listener port.
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for the API server.
///
/// Custom `Debug` implementation redacts the oracle secret.
#[derive(Clone)]
pub struct ApiConfig {
    /// TCP port to bind.
    pub port: u16,
    /// Gate timeouts, retry policy, identity scheme and domain.
    pub gate: GateConfig,
    /// Master secret for the in-process oracle. `None` generates one at
    /// startup, so ciphertext does not survive a restart.
    pub oracle_secret: Option<Zeroizing<[u8; 32]>>,
    /// Emit JSON logs.
    pub log_json: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("port", &self.port)
            .field("gate", &self.gate)
            .field("oracle_secret", &self.oracle_secret.as_ref().map(|_| "[REDACTED]"))
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gate: GateConfig::default(),
            oracle_secret: None,
            log_json: false,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PORT` (default: 8080)
    /// - `VAULTGATE_ORACLE_SECRET` (64 hex characters, optional)
    /// - `VAULTGATE_LOG_JSON` (`1` or `true` for JSON logs)
    /// - every variable read by [`GateConfig::from_env`]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var: "PORT", value: raw })?,
        };
        let oracle_secret = lookup("VAULTGATE_ORACLE_SECRET")
            .map(|raw| {
                let mut secret = Zeroizing::new([0u8; 32]);
                hex::decode_to_slice(raw.trim(), &mut secret[..])
                    .map_err(|_| ConfigError::InvalidSecret("VAULTGATE_ORACLE_SECRET"))?;
                Ok::<_, ConfigError>(secret)
            })
            .transpose()?;
        let log_json = lookup("VAULTGATE_LOG_JSON")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);
        Ok(Self {
            port,
            gate: GateConfig::from_lookup(&lookup)?,
            oracle_secret,
            log_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ApiConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.oracle_secret.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn secret_is_parsed_and_redacted() {
        let secret = "ab".repeat(32);
        let config = ApiConfig::from_lookup(|name| match name {
            "VAULTGATE_ORACLE_SECRET" => Some(secret.clone()),
            "PORT" => Some("9090".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.oracle_secret.as_deref(), Some(&[0xab; 32]));
        let debug = format!("{config:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&secret));
    }

    #[test]
    fn short_secret_rejected() {
        let result = ApiConfig::from_lookup(|name| (name == "VAULTGATE_ORACLE_SECRET").then(|| "abcd".into()));
        assert!(matches!(result, Err(ConfigError::InvalidSecret(_))));
    }
}
