//! Client configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! private_key = "$PRIVATE_KEY"
//! allowed_networks = ["base-sepolia"]
//! check_balance = true
//!
//! [networks.base-sepolia]
//! rpc_url = "${BASE_SEPOLIA_RPC_URL}"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `proxy402.toml`)
//! - Any variable referenced by `$VAR` in the config file

use std::collections::HashMap;
use std::path::Path;

use proxy402_evm::EvmNetworks;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Payer private key (hex). The `PRIVATE_KEY` environment variable and
    /// `--private-key` take precedence.
    #[serde(default)]
    pub private_key: Option<String>,

    /// Networks the client may pay on. Every known network when absent.
    #[serde(default)]
    pub allowed_networks: Option<Vec<String>>,

    /// Refuse to sign when the payer's balance does not cover the amount.
    #[serde(default)]
    pub check_balance: bool,

    /// Per-network overrides keyed by x402 network name.
    #[serde(default)]
    pub networks: HashMap<String, NetworkOverride>,
}

/// Overrides for one built-in network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkOverride {
    /// HTTP RPC endpoint used for balance and domain reads.
    #[serde(default)]
    pub rpc_url: Option<String>,
}

impl ClientConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `proxy402.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, CliError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "proxy402.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, CliError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses a TOML document after expanding environment variables in it.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if the document is not valid.
    pub fn parse(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(&expand_env_vars(content))?)
    }

    /// Applies the overrides to the built-in network table.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::UnknownNetwork`] if an override or the allow-list
    /// names a network that is not built in.
    pub fn networks(&self) -> Result<EvmNetworks, CliError> {
        let mut networks = EvmNetworks::known();
        for (name, network) in &self.networks {
            if networks.by_name(name).is_none() {
                return Err(CliError::UnknownNetwork(name.clone()));
            }
            if let Some(rpc_url) = &network.rpc_url {
                networks = networks.with_rpc_url(name, rpc_url.clone());
            }
        }
        if let Some(allowed) = &self.allowed_networks {
            if let Some(unknown) = allowed.iter().find(|n| networks.by_name(n).is_none()) {
                return Err(CliError::UnknownNetwork(unknown.clone()));
            }
        }
        Ok(networks)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.next_if_eq(&'{').is_some();
        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                chars.next();
                if c == '}' {
                    break;
                }
            } else if c.is_ascii_alphanumeric() || c == '_' {
                chars.next();
            } else {
                break;
            }
            var_name.push(c);
        }

        match std::env::var(&var_name) {
            Ok(value) if !var_name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                    result.push_str(&var_name);
                    result.push('}');
                } else {
                    result.push_str(&var_name);
                }
            }
        }
    }

    result
}
