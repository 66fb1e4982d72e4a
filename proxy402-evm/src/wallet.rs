//! EIP-1193 wallet capability.
//!
//! A wallet is anything that answers JSON-RPC style `request(method, params)`
//! calls: a browser extension bridged over a channel, a remote signer, or a
//! test fake. Errors carry the EIP-1193 numeric codes the payment flow
//! branches on.

use alloy_primitives::Address;
use proxy402::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chain::{ChainId, NativeCurrency, NetworkConfig, chain_id_hex, parse_chain_id_hex};

/// An error returned by an EIP-1193 provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("wallet error {code}: {message}")]
pub struct ProviderRpcError {
    /// EIP-1193 / JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Provider-specific detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The wallet does not know the requested chain.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// Generic JSON-RPC internal error.
    pub const INTERNAL: i64 = -32603;

    /// Creates an error with a code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// An internal error for malformed or unexpected wallet responses.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL, message)
    }

    /// Returns `true` for code 4001.
    #[must_use]
    pub const fn is_user_rejection(&self) -> bool {
        self.code == Self::USER_REJECTED
    }

    /// Returns `true` for code 4902.
    #[must_use]
    pub const fn is_unrecognized_chain(&self) -> bool {
        self.code == Self::UNRECOGNIZED_CHAIN
    }
}

/// The request/response channel to an EIP-1193 wallet.
pub trait Eip1193Provider: Send + Sync {
    /// Sends one request and awaits its result.
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ProviderRpcError>>;
}

impl<T: Eip1193Provider + ?Sized> Eip1193Provider for std::sync::Arc<T> {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ProviderRpcError>> {
        (**self).request(method, params)
    }
}

/// Parameters of `wallet_addEthereumChain` (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    /// Hex chain ID.
    pub chain_id: String,
    /// Display name.
    pub chain_name: String,
    /// RPC endpoints.
    pub rpc_urls: Vec<String>,
    /// Block explorer URLs.
    pub block_explorer_urls: Vec<String>,
    /// Gas token.
    pub native_currency: NativeCurrency,
}

impl From<&NetworkConfig> for AddChainParams {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            chain_id: chain_id_hex(network.chain_id),
            chain_name: network.display_name.clone(),
            rpc_urls: vec![network.rpc_url.clone()],
            block_explorer_urls: vec![network.explorer_url.clone()],
            native_currency: network.native_currency.clone(),
        }
    }
}

/// Reads the wallet's active chain via `eth_chainId`.
///
/// # Errors
///
/// Returns the provider error, or an internal error if the result is not a
/// hex quantity.
pub async fn chain_id<W: Eip1193Provider + ?Sized>(
    wallet: &W,
) -> Result<ChainId, ProviderRpcError> {
    let value = wallet.request("eth_chainId", json!([])).await?;
    value
        .as_str()
        .and_then(parse_chain_id_hex)
        .ok_or_else(|| ProviderRpcError::internal(format!("invalid eth_chainId result: {value}")))
}

/// Asks the wallet to switch to `chain_id` via `wallet_switchEthereumChain`.
///
/// # Errors
///
/// Returns the provider error unchanged; code 4902 means the chain is unknown.
pub async fn switch_chain<W: Eip1193Provider + ?Sized>(
    wallet: &W,
    chain_id: ChainId,
) -> Result<(), ProviderRpcError> {
    wallet
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain_id_hex(chain_id) }]),
        )
        .await
        .map(|_| ())
}

/// Registers a chain with the wallet via `wallet_addEthereumChain`.
///
/// # Errors
///
/// Returns the provider error unchanged.
pub async fn add_chain<W: Eip1193Provider + ?Sized>(
    wallet: &W,
    params: &AddChainParams,
) -> Result<(), ProviderRpcError> {
    let params = serde_json::to_value(params)
        .map_err(|e| ProviderRpcError::internal(e.to_string()))?;
    wallet
        .request("wallet_addEthereumChain", Value::Array(vec![params]))
        .await
        .map(|_| ())
}

/// Requests the wallet's accounts via `eth_requestAccounts` and returns the first.
///
/// # Errors
///
/// Returns the provider error, or an internal error if no valid account is returned.
pub async fn request_account<W: Eip1193Provider + ?Sized>(
    wallet: &W,
) -> Result<Address, ProviderRpcError> {
    let value = wallet.request("eth_requestAccounts", json!([])).await?;
    value
        .as_array()
        .and_then(|accounts| accounts.first())
        .and_then(Value::as_str)
        .and_then(|account| account.parse().ok())
        .ok_or_else(|| ProviderRpcError::internal(format!("no usable account in {value}")))
}
