//! Known EVM networks and their USDC deployments.
//!
//! [`EvmNetworks`] is the immutable table a
//! [`NetworkResolver`](crate::resolver::NetworkResolver) is built from. Start
//! from [`EvmNetworks::known`] and adjust it with the builder methods before
//! handing it over; the resolver never mutates it.

use alloy_primitives::{Address, address};

use crate::chain::{AssetInfo, ChainId, NativeCurrency, NetworkConfig};

/// Base Mainnet chain ID.
pub const BASE_MAINNET: ChainId = 8453;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: ChainId = 84532;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = 137;

/// Polygon Amoy (testnet) chain ID.
pub const POLYGON_AMOY: ChainId = 80002;

/// Avalanche C-Chain chain ID.
pub const AVALANCHE_MAINNET: ChainId = 43114;

/// Avalanche Fuji (testnet) chain ID.
pub const AVALANCHE_FUJI: ChainId = 43113;

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: ChainId = 1;

/// Celo Mainnet chain ID.
pub const CELO_MAINNET: ChainId = 42220;

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// USDC contract address on Polygon Mainnet.
pub const USDC_POLYGON: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// USDC contract address on Polygon Amoy.
pub const USDC_POLYGON_AMOY: Address = address!("41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF");

/// USDC contract address on Avalanche C-Chain.
pub const USDC_AVALANCHE: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");

/// USDC contract address on Avalanche Fuji.
pub const USDC_AVALANCHE_FUJI: Address = address!("5425890298aed601595a70AB815c96711a31Bc65");

/// USDC contract address on Celo.
pub const USDC_CELO: Address = address!("cebA9300f2b948710d2653dD7B07f33A8B32118C");

/// Default EIP-712 domain name for USDC.
pub const DEFAULT_USDC_NAME: &str = "USD Coin";

/// Default EIP-712 domain version for USDC.
pub const DEFAULT_USDC_VERSION: &str = "2";

/// Default token decimals for USDC.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// An immutable table of EVM networks keyed by x402 network name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmNetworks {
    networks: Vec<NetworkConfig>,
}

impl Default for EvmNetworks {
    fn default() -> Self {
        Self::known()
    }
}

impl EvmNetworks {
    /// Creates a table from explicit network configurations.
    #[must_use]
    pub const fn new(networks: Vec<NetworkConfig>) -> Self {
        Self { networks }
    }

    /// The networks this crate knows out of the box.
    #[must_use]
    pub fn known() -> Self {
        Self::new(known_networks())
    }

    /// Looks up a network by its x402 name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.name == name)
    }

    /// Looks up a network by chain ID.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// Iterates over every configured network.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.iter()
    }

    /// Returns the number of configured networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Returns `true` if no network is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Adds a network, replacing any existing entry with the same name.
    #[must_use]
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.networks.retain(|n| n.name != network.name);
        self.networks.push(network);
        self
    }

    /// Overrides the RPC URL of a named network. Unknown names are ignored.
    #[must_use]
    pub fn with_rpc_url(mut self, name: &str, rpc_url: impl Into<String>) -> Self {
        if let Some(network) = self.networks.iter_mut().find(|n| n.name == name) {
            network.rpc_url = rpc_url.into();
        }
        self
    }

    /// Keeps only the named networks.
    #[must_use]
    pub fn restricted_to<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.networks
            .retain(|n| names.iter().any(|name| name.as_ref() == n.name));
        self
    }
}

/// Returns network configurations for all known EVM networks.
#[must_use]
pub fn known_networks() -> Vec<NetworkConfig> {
    vec![
        network(
            "base",
            BASE_MAINNET,
            "Base",
            "https://mainnet.base.org",
            "https://basescan.org",
            "ETH",
            usdc_asset(USDC_BASE, DEFAULT_USDC_NAME),
        ),
        network(
            "base-sepolia",
            BASE_SEPOLIA,
            "Base Sepolia",
            "https://sepolia.base.org",
            "https://sepolia.basescan.org",
            "ETH",
            usdc_asset(USDC_BASE_SEPOLIA, "USDC"),
        ),
        network(
            "ethereum",
            ETHEREUM_MAINNET,
            "Ethereum",
            "https://ethereum-rpc.publicnode.com",
            "https://etherscan.io",
            "ETH",
            usdc_asset(USDC_ETHEREUM, DEFAULT_USDC_NAME),
        ),
        network(
            "polygon",
            POLYGON_MAINNET,
            "Polygon",
            "https://polygon-rpc.com",
            "https://polygonscan.com",
            "POL",
            usdc_asset(USDC_POLYGON, DEFAULT_USDC_NAME),
        ),
        network(
            "polygon-amoy",
            POLYGON_AMOY,
            "Polygon Amoy",
            "https://rpc-amoy.polygon.technology",
            "https://amoy.polygonscan.com",
            "POL",
            usdc_asset(USDC_POLYGON_AMOY, "USDC"),
        ),
        network(
            "avalanche",
            AVALANCHE_MAINNET,
            "Avalanche C-Chain",
            "https://api.avax.network/ext/bc/C/rpc",
            "https://snowtrace.io",
            "AVAX",
            usdc_asset(USDC_AVALANCHE, DEFAULT_USDC_NAME),
        ),
        network(
            "avalanche-fuji",
            AVALANCHE_FUJI,
            "Avalanche Fuji",
            "https://api.avax-test.network/ext/bc/C/rpc",
            "https://testnet.snowtrace.io",
            "AVAX",
            usdc_asset(USDC_AVALANCHE_FUJI, DEFAULT_USDC_NAME),
        ),
        network(
            "celo",
            CELO_MAINNET,
            "Celo",
            "https://forno.celo.org",
            "https://celoscan.io",
            "CELO",
            usdc_asset(USDC_CELO, DEFAULT_USDC_NAME),
        ),
    ]
}

fn network(
    name: &str,
    chain_id: ChainId,
    display_name: &str,
    rpc_url: &str,
    explorer_url: &str,
    currency: &str,
    asset: AssetInfo,
) -> NetworkConfig {
    NetworkConfig {
        name: name.to_owned(),
        chain_id,
        display_name: display_name.to_owned(),
        rpc_url: rpc_url.to_owned(),
        explorer_url: explorer_url.to_owned(),
        native_currency: NativeCurrency::ether_like(currency),
        assets: vec![asset],
    }
}

fn usdc_asset(address: Address, name: &str) -> AssetInfo {
    AssetInfo {
        address,
        decimals: DEFAULT_TOKEN_DECIMALS,
        name: name.to_owned(),
        version: DEFAULT_USDC_VERSION.to_owned(),
    }
}
