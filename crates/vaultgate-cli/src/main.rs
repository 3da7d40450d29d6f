//! # vaultgate CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vaultgate_cli::keys::{run_key, KeyArgs};
use vaultgate_cli::session::{run_session, SessionArgs};
use vaultgate_cli::token::{run_token, TokenArgs};

/// vaultgate operator CLI
///
/// Wallet keys, session access tokens for the decryption gate, and bearer
/// tokens.
#[derive(Parser, Debug)]
#[command(name = "vaultgate", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ed25519 wallet generation and address derivation.
    Key(KeyArgs),

    /// Mint or inspect session access tokens.
    Session(SessionArgs),

    /// Generate bearer tokens.
    Token(TokenArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Key(args) => run_key(&args),
        Commands::Session(args) => run_session(&args),
        Commands::Token(args) => run_token(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
