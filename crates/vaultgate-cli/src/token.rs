//! # Token Subcommand
//!
//! Prints a fresh 256-bit bearer token, hex-encoded.

use anyhow::Result;
use clap::Args;
use vaultgate_crypto::BearerToken;

/// Arguments for `vaultgate token`.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Number of tokens to print.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,
}

/// Execute the token subcommand.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    for _ in 0..args.count {
        println!("{}", BearerToken::generate().expose());
    }
    Ok(0)
}
