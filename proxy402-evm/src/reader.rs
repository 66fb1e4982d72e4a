//! Read-only token queries: `balanceOf` and the EIP-712 `version()`.
//!
//! Two readers share the same ABI encoding and differ only in how the
//! `eth_call` travels: [`RpcTokenReader`] talks to a JSON-RPC node over HTTP,
//! [`Eip1193TokenReader`] routes the call through the connected wallet.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_sol_types::SolCall;
use proxy402::{BoxFuture, PaymentError};
use serde_json::json;
use tracing::debug;

use crate::chain::ChainId;
use crate::contract::IEIP3009::{balanceOfCall, versionCall};
use crate::networks::EvmNetworks;
use crate::wallet::{self, Eip1193Provider};

/// Reads token state needed before signing.
pub trait TokenReader: Send + Sync {
    /// Returns `owner`'s balance of `asset` on `chain_id`.
    fn balance_of<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
        owner: Address,
    ) -> BoxFuture<'a, Result<U256, PaymentError>>;

    /// Returns the EIP-712 domain version reported by `asset` on `chain_id`.
    fn version<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
    ) -> BoxFuture<'a, Result<String, PaymentError>>;

    /// Whether reads only succeed on the connected wallet's active chain.
    ///
    /// The client moves the wallet to the payment chain before reading from
    /// such a reader.
    fn follows_wallet_chain(&self) -> bool {
        false
    }
}

impl<T: TokenReader + ?Sized> TokenReader for Arc<T> {
    fn balance_of<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
        owner: Address,
    ) -> BoxFuture<'a, Result<U256, PaymentError>> {
        (**self).balance_of(chain_id, asset, owner)
    }

    fn version<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
    ) -> BoxFuture<'a, Result<String, PaymentError>> {
        (**self).version(chain_id, asset)
    }

    fn follows_wallet_chain(&self) -> bool {
        (**self).follows_wallet_chain()
    }
}

fn decode_balance(result: &Bytes) -> Result<U256, PaymentError> {
    balanceOfCall::abi_decode_returns(result)
        .map_err(|e| PaymentError::TransportError(format!("invalid balanceOf response: {e}")))
}

fn decode_version(result: &Bytes) -> Result<String, PaymentError> {
    versionCall::abi_decode_returns(result)
        .map_err(|e| PaymentError::TransportError(format!("invalid version response: {e}")))
}

/// Token reader backed by one HTTP JSON-RPC provider per configured network.
#[derive(Clone)]
pub struct RpcTokenReader {
    providers: HashMap<ChainId, DynProvider>,
}

impl std::fmt::Debug for RpcTokenReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcTokenReader")
            .field("chains", &self.providers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RpcTokenReader {
    /// Connects to the RPC URL of every network in the table.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::UnsupportedNetwork`] naming the first network
    /// whose RPC URL does not parse.
    pub fn from_networks(networks: &EvmNetworks) -> Result<Self, PaymentError> {
        let mut providers = HashMap::with_capacity(networks.len());
        for network in networks.iter() {
            let url: url::Url = network.rpc_url.parse().map_err(|e| {
                PaymentError::UnsupportedNetwork(format!(
                    "{}: invalid RPC URL {:?}: {e}",
                    network.name, network.rpc_url
                ))
            })?;
            let provider = ProviderBuilder::new().connect_http(url).erased();
            providers.insert(network.chain_id, provider);
        }
        Ok(Self { providers })
    }

    async fn eth_call(
        &self,
        chain_id: ChainId,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<Bytes, PaymentError> {
        let provider = self.providers.get(&chain_id).ok_or_else(|| {
            PaymentError::UnsupportedNetwork(format!("no RPC provider for chain {chain_id}"))
        })?;
        let tx = alloy_rpc_types_eth::TransactionRequest::default()
            .to(to)
            .input(Bytes::from(calldata).into());
        provider
            .call(tx)
            .await
            .map_err(|e| PaymentError::TransportError(e.to_string()))
    }
}

impl TokenReader for RpcTokenReader {
    fn balance_of<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
        owner: Address,
    ) -> BoxFuture<'a, Result<U256, PaymentError>> {
        Box::pin(async move {
            let calldata = balanceOfCall { account: owner }.abi_encode();
            let result = self.eth_call(chain_id, asset, calldata).await?;
            decode_balance(&result)
        })
    }

    fn version<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
    ) -> BoxFuture<'a, Result<String, PaymentError>> {
        Box::pin(async move {
            let result = self
                .eth_call(chain_id, asset, versionCall {}.abi_encode())
                .await?;
            decode_version(&result)
        })
    }
}

/// Token reader that issues `eth_call` through the connected wallet.
///
/// The wallet answers for its active chain only; a call for any other chain
/// fails with [`PaymentError::TransportError`] instead of reading the wrong
/// network.
#[derive(Debug, Clone)]
pub struct Eip1193TokenReader<W> {
    wallet: Arc<W>,
}

impl<W: Eip1193Provider> Eip1193TokenReader<W> {
    /// Creates a reader over the given wallet.
    pub const fn new(wallet: Arc<W>) -> Self {
        Self { wallet }
    }

    async fn eth_call(
        &self,
        chain_id: ChainId,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<Bytes, PaymentError> {
        let active = wallet::chain_id(self.wallet.as_ref())
            .await
            .map_err(|e| PaymentError::TransportError(e.to_string()))?;
        if active != chain_id {
            return Err(PaymentError::TransportError(format!(
                "wallet is on chain {active}, cannot read chain {chain_id}"
            )));
        }
        debug!(%to, chain_id, "eth_call through wallet");
        let params = json!([{ "to": to, "data": Bytes::from(calldata) }, "latest"]);
        let value = self
            .wallet
            .request("eth_call", params)
            .await
            .map_err(|e| PaymentError::TransportError(e.to_string()))?;
        value
            .as_str()
            .and_then(|hex| hex.parse::<Bytes>().ok())
            .ok_or_else(|| {
                PaymentError::TransportError(format!("invalid eth_call result: {value}"))
            })
    }
}

impl<W: Eip1193Provider> TokenReader for Eip1193TokenReader<W> {
    fn balance_of<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
        owner: Address,
    ) -> BoxFuture<'a, Result<U256, PaymentError>> {
        Box::pin(async move {
            let calldata = balanceOfCall { account: owner }.abi_encode();
            let result = self.eth_call(chain_id, asset, calldata).await?;
            decode_balance(&result)
        })
    }

    fn version<'a>(
        &'a self,
        chain_id: ChainId,
        asset: Address,
    ) -> BoxFuture<'a, Result<String, PaymentError>> {
        Box::pin(async move {
            let result = self
                .eth_call(chain_id, asset, versionCall {}.abi_encode())
                .await?;
            decode_version(&result)
        })
    }

    fn follows_wallet_chain(&self) -> bool {
        true
    }
}
