//! Command-line x402 client.
//!
//! Fetches a URL and pays any `402 Payment Required` challenge with a local
//! private key.
//!
//! # Modules
//!
//! - [`config`] - Client configuration with environment variable expansion
//! - [`error`] - Client error types

pub mod config;
pub mod error;

pub use config::ClientConfig;
pub use error::CliError;
