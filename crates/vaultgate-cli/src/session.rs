//! # Session Subcommand
//!
//! `mint` signs a session credential with a stored wallet seed and prints
//! its access token. `inspect` decodes a token and reports who it speaks
//! for and until when, checking the wallet signature; the embedded session
//! key is never printed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use vaultgate_core::EpochMillis;
use vaultgate_crypto::derive_address;
use vaultgate_gate::{GateConfig, SessionCredential, Signed};

use crate::keys::load_wallet;

/// Arguments for `vaultgate session`.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Sign a session credential and print its access token.
    Mint {
        /// Path to the wallet seed file.
        #[arg(long)]
        key: PathBuf,
        /// Lifetime in minutes (1-30).
        #[arg(long, default_value_t = 10)]
        ttl: u64,
        /// Domain-separation context. Defaults to `VAULTGATE_DOMAIN` or
        /// `vaultgate/v1`.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Decode an access token and report its claims.
    Inspect {
        /// The access token.
        #[arg(value_name = "TOKEN")]
        token: String,
        /// Domain the token must be valid for. Omit to skip the check.
        #[arg(long)]
        domain: Option<String>,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the session subcommand.
pub fn run_session(args: &SessionArgs) -> Result<u8> {
    match &args.command {
        SessionCommand::Mint { key, ttl, domain } => {
            let domain = match domain {
                Some(d) => d.clone(),
                None => GateConfig::from_env().context("invalid gate configuration")?.domain,
            };
            let wallet = load_wallet(key)?;
            println!("{}", mint(&wallet, &domain, *ttl, EpochMillis::now())?);
            Ok(0)
        }
        SessionCommand::Inspect { token, domain, json } => {
            let report = inspect(token, domain.as_deref(), EpochMillis::now())?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Ok(if report.usable { 0 } else { 2 })
        }
    }
}

/// Sign a credential for the wallet's own address and export it.
pub fn mint(
    wallet: &vaultgate_crypto::Ed25519KeyPair,
    domain: &str,
    ttl_min: u64,
    created_at: EpochMillis,
) -> Result<String> {
    let address = derive_address(&wallet.public_key());
    let credential = SessionCredential::new(address, domain, ttl_min, created_at)?.sign(wallet)?;
    tracing::debug!(address = %credential.address(), ttl_min, "session credential minted");
    Ok(credential.to_access_token()?)
}

/// What `inspect` reports about a token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub address: String,
    pub domain: String,
    pub created_at: String,
    pub expires_at: String,
    pub ttl_min: u64,
    pub session_public_key: String,
    pub expired: bool,
    /// Whether the token would pass the gate's credential check now.
    pub usable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

impl std::fmt::Display for Inspection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "address:     {}", self.address)?;
        writeln!(f, "domain:      {}", self.domain)?;
        writeln!(f, "created at:  {}", self.created_at)?;
        writeln!(f, "expires at:  {} ({} min)", self.expires_at, self.ttl_min)?;
        writeln!(f, "session key: {}", self.session_public_key)?;
        match &self.problem {
            None => writeln!(f, "status:      OK"),
            Some(problem) => writeln!(f, "status:      {problem}"),
        }
    }
}

/// Decode and check an access token at `now`.
pub fn inspect(token: &str, domain: Option<&str>, now: EpochMillis) -> Result<Inspection> {
    let credential = SessionCredential::<Signed>::from_access_token(token.trim())?;
    let check = match domain {
        Some(domain) => credential.validate(domain, now),
        None => credential.verify_proof().and_then(|()| {
            if credential.is_expired(now) {
                Err(vaultgate_gate::GateError::InvalidCredential("session credential expired".into()))
            } else {
                Ok(())
            }
        }),
    };

    Ok(Inspection {
        address: credential.address().to_string(),
        domain: credential.domain().to_string(),
        created_at: credential.created_at().to_string(),
        expires_at: credential.expires_at().to_string(),
        ttl_min: credential.ttl_min(),
        session_public_key: credential.session_public_key().to_hex(),
        expired: credential.is_expired(now),
        usable: check.is_ok(),
        problem: check.err().map(|e| e.to_string()),
    })
}
