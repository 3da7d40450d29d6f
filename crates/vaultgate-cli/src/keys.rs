//! # Key Subcommand
//!
//! Generates an Ed25519 wallet and prints the ledger address it controls.
//! The seed is written to `<prefix>.key` and the public key to
//! `<prefix>.pub`, both hex.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use vaultgate_core::Address;
use vaultgate_crypto::{derive_address, Ed25519KeyPair};

/// Arguments for `vaultgate key`.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

/// Key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Generate a new wallet key pair.
    Generate {
        /// Output directory for the key files.
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
        /// Prefix for the key filenames.
        #[arg(long, default_value = "vaultgate")]
        prefix: String,
    },

    /// Print the address controlled by a stored wallet seed.
    Address {
        /// Path to the seed file (64 hex characters).
        #[arg(long)]
        key: PathBuf,
    },
}

/// Execute the key subcommand.
pub fn run_key(args: &KeyArgs) -> Result<u8> {
    match &args.command {
        KeyCommand::Generate { output, prefix } => {
            let generated = generate(output, prefix)?;
            println!("OK: generated Ed25519 wallet");
            println!("  Seed:       {}", generated.key_path.display());
            println!("  Public key: {}", generated.pub_path.display());
            println!("  Address:    {}", generated.address);
            Ok(0)
        }
        KeyCommand::Address { key } => {
            let wallet = load_wallet(key)?;
            println!("{}", derive_address(&wallet.public_key()));
            Ok(0)
        }
    }
}

/// Files written by [`generate`].
#[derive(Debug)]
pub struct GeneratedKey {
    pub key_path: PathBuf,
    pub pub_path: PathBuf,
    pub address: Address,
}

/// Generate a wallet and write its seed and public key under `output_dir`.
pub fn generate(output_dir: &Path, prefix: &str) -> Result<GeneratedKey> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory: {}", output_dir.display()))?;

    let wallet = Ed25519KeyPair::generate();
    let key_path = output_dir.join(format!("{prefix}.key"));
    let pub_path = output_dir.join(format!("{prefix}.pub"));

    std::fs::write(&key_path, wallet.seed_hex().as_bytes())
        .with_context(|| format!("failed to write seed: {}", key_path.display()))?;
    std::fs::write(&pub_path, wallet.public_key().to_hex())
        .with_context(|| format!("failed to write public key: {}", pub_path.display()))?;

    Ok(GeneratedKey {
        key_path,
        pub_path,
        address: derive_address(&wallet.public_key()),
    })
}

/// Read a hex seed file into a wallet.
pub fn load_wallet(path: &Path) -> Result<Ed25519KeyPair> {
    let seed = zeroize::Zeroizing::new(
        std::fs::read_to_string(path).with_context(|| format!("failed to read seed: {}", path.display()))?,
    );
    Ed25519KeyPair::from_seed_hex(seed.trim()).map_err(|e| anyhow::anyhow!("invalid seed in {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_seed_reloads_to_same_address() {
        let dir = tempfile::tempdir().unwrap();
        let generated = generate(dir.path(), "svc").unwrap();
        assert!(generated.pub_path.exists());
        let wallet = load_wallet(&generated.key_path).unwrap();
        assert_eq!(derive_address(&wallet.public_key()), generated.address);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.key");
        std::fs::write(&path, "not hex").unwrap();
        assert!(load_wallet(&path).is_err());
        assert!(load_wallet(&dir.path().join("missing.key")).is_err());
    }
}
