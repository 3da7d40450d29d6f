//! # API Route Modules
//!
//! - `decrypt`: the decryption gate behind a session access token,
//!   single item and batch.
//! - `grants`: bearer-token introspection for registered services.

pub mod decrypt;
pub mod grants;
