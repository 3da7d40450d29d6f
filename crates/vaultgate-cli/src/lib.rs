//! # vaultgate-cli: Operator CLI
//!
//! ## Subcommands
//!
//! - `vaultgate key`: Ed25519 wallet generation and address derivation.
//! - `vaultgate session`: Mint a signed session access token, or inspect
//!   one without revealing its session key.
//! - `vaultgate token`: Generate a 256-bit bearer token.
//!
//! ```bash
//! vaultgate key generate --output keys --prefix service
//! vaultgate session mint --key keys/service.key --ttl 10
//! vaultgate session inspect "$TOKEN" --domain vaultgate/v1
//! ```

pub mod keys;
pub mod session;
pub mod token;
