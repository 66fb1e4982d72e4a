//! EVM chain primitives.
//!
//! Provides the per-network records the resolver is built from: chain IDs,
//! the native currency a wallet needs to add an unknown chain, and token
//! deployments with their EIP-712 domain parameters.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// An EIP-155 chain ID (e.g., 8453 for Base, 137 for Polygon).
pub type ChainId = u64;

/// Formats a chain ID the way EIP-1193 wallets expect it (`0x2105` for 8453).
#[must_use]
pub fn chain_id_hex(chain_id: ChainId) -> String {
    format!("{chain_id:#x}")
}

/// Parses a `0x`-prefixed hex chain ID as returned by `eth_chainId`.
///
/// Returns `None` if the input is not valid hex.
#[must_use]
pub fn parse_chain_id_hex(hex: &str) -> Option<ChainId> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))?;
    ChainId::from_str_radix(digits, 16).ok()
}

/// The gas token of a network, as described to `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Currency name (e.g., `"ETH"`).
    pub name: String,
    /// Ticker symbol (e.g., `"ETH"`).
    pub symbol: String,
    /// Number of decimals, 18 for every chain this crate ships.
    pub decimals: u8,
}

impl NativeCurrency {
    /// An 18-decimal currency whose name and symbol are both `symbol`.
    #[must_use]
    pub fn ether_like(symbol: &str) -> Self {
        Self {
            name: symbol.to_owned(),
            symbol: symbol.to_owned(),
            decimals: 18,
        }
    }
}

/// Asset information for a token on a specific network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Contract address.
    pub address: Address,
    /// Number of decimals.
    pub decimals: u8,
    /// EIP-712 domain name for the token contract.
    pub name: String,
    /// EIP-712 domain version for the token contract.
    pub version: String,
}

/// Configuration for one EVM network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// x402 network name (e.g., `"base-sepolia"`).
    pub name: String,
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// Human-readable chain name shown by wallets (e.g., `"Base Sepolia"`).
    pub display_name: String,
    /// Public JSON-RPC endpoint.
    pub rpc_url: String,
    /// Block explorer base URL.
    pub explorer_url: String,
    /// The chain's gas token.
    pub native_currency: NativeCurrency,
    /// Known token deployments; the first is the network's default asset.
    pub assets: Vec<AssetInfo>,
}

impl NetworkConfig {
    /// Finds an asset by its contract address.
    #[must_use]
    pub fn find_asset(&self, address: Address) -> Option<&AssetInfo> {
        self.assets.iter().find(|a| a.address == address)
    }

    /// Returns the network's default payment asset.
    #[must_use]
    pub fn default_asset(&self) -> Option<&AssetInfo> {
        self.assets.first()
    }
}
