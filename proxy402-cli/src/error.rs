//! Error types for the command-line client.

use proxy402::PaymentError;

/// Errors that can occur in the command-line client.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML or has wrong types.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration names a network that is not built in.
    #[error("unknown network in configuration: {0}")]
    UnknownNetwork(String),

    /// No private key was supplied.
    #[error("no private key: set PRIVATE_KEY or pass --private-key")]
    MissingKey,

    /// The private key does not parse.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// A `--header` argument is not `Name: value`.
    #[error("invalid header {0:?}, expected \"Name: value\"")]
    InvalidHeader(String),

    /// Building or reading the HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The payment flow failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),
}
