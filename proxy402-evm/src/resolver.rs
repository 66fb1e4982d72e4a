//! Network name, asset and signing-domain resolution.
//!
//! [`NetworkResolver`] answers every chain question the payment flow asks:
//! which chain ID a network name means, which asset a chain pays in, which
//! EIP-712 domain a token signs under, and whether the wallet is on the
//! right chain. It is built once from an immutable [`EvmNetworks`] table.

use std::sync::Arc;

use alloy_primitives::Address;
use dashmap::DashMap;
use proxy402::PaymentError;
use tracing::{debug, instrument, warn};

use crate::chain::ChainId;
use crate::exact::PaymentRequirementsExtra;
use crate::networks::{DEFAULT_USDC_NAME, DEFAULT_USDC_VERSION, EvmNetworks};
use crate::reader::TokenReader;
use crate::typed_data::DomainMetadata;
use crate::wallet::{self, AddChainParams, Eip1193Provider, ProviderRpcError};

/// Resolves network names, assets and signing domains.
pub struct NetworkResolver {
    networks: EvmNetworks,
    reader: Option<Arc<dyn TokenReader>>,
    domains: DashMap<(ChainId, Address), DomainMetadata>,
}

impl std::fmt::Debug for NetworkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkResolver")
            .field("networks", &self.networks.len())
            .field("has_reader", &self.reader.is_some())
            .field("cached_domains", &self.domains.len())
            .finish()
    }
}

impl Default for NetworkResolver {
    fn default() -> Self {
        Self::new(EvmNetworks::known())
    }
}

impl NetworkResolver {
    /// Creates a resolver over the given network table.
    #[must_use]
    pub fn new(networks: EvmNetworks) -> Self {
        Self {
            networks,
            reader: None,
            domains: DashMap::new(),
        }
    }

    /// Reads token `version()` live through `reader` when a challenge
    /// carries no domain override.
    #[must_use]
    pub fn with_token_reader(mut self, reader: Arc<dyn TokenReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// The network table this resolver was built from.
    #[must_use]
    pub const fn networks(&self) -> &EvmNetworks {
        &self.networks
    }

    /// Maps an x402 network name to its chain ID.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::UnsupportedNetwork`] if the name is unknown.
    pub fn chain_id_for(&self, network: &str) -> Result<ChainId, PaymentError> {
        self.networks
            .by_name(network)
            .map(|n| n.chain_id)
            .ok_or_else(|| PaymentError::UnsupportedNetwork(network.to_owned()))
    }

    /// Returns the default payment asset deployed on `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::UnsupportedNetwork`] if the chain is unknown
    /// or has no asset configured.
    pub fn asset_address_for(&self, chain_id: ChainId) -> Result<Address, PaymentError> {
        self.networks
            .by_chain_id(chain_id)
            .and_then(|n| n.default_asset())
            .map(|a| a.address)
            .ok_or_else(|| {
                PaymentError::UnsupportedNetwork(format!("no asset for chain {chain_id}"))
            })
    }

    /// Returns the EIP-712 domain `asset` on `network` signs under.
    ///
    /// Order of preference: the challenge's `extra`; a cached result; the
    /// statically known name paired with the contract's live `version()`
    /// (or the static version when no reader is configured or the call
    /// fails). Unknown network/asset pairs fall back to `"USD Coin"`/`"2"`.
    #[instrument(skip(self, extra), level = "debug")]
    pub async fn domain_for(
        &self,
        network: &str,
        asset: Address,
        extra: Option<&PaymentRequirementsExtra>,
    ) -> DomainMetadata {
        if let Some(extra) = extra.filter(|e| !e.name.is_empty() && !e.version.is_empty()) {
            return DomainMetadata::from(extra.clone());
        }

        let Some((chain_id, known)) = self.networks.by_name(network).and_then(|n| {
            n.find_asset(asset)
                .map(|a| (n.chain_id, DomainMetadata::new(&a.name, &a.version)))
        }) else {
            warn!(network, %asset, "unknown asset, using default signing domain");
            return DomainMetadata::new(DEFAULT_USDC_NAME, DEFAULT_USDC_VERSION);
        };

        if let Some(cached) = self.domains.get(&(chain_id, asset)) {
            return cached.clone();
        }

        let domain = match &self.reader {
            Some(reader) => match reader.version(chain_id, asset).await {
                Ok(version) => DomainMetadata::new(known.name, version),
                Err(e) => {
                    warn!(
                        network,
                        %asset,
                        error = %e,
                        "version() lookup failed, using static domain"
                    );
                    return known;
                }
            },
            None => known,
        };
        debug!(name = %domain.name, version = %domain.version, "resolved signing domain");
        self.domains.insert((chain_id, asset), domain.clone());
        domain
    }

    /// Makes sure `wallet` is connected to `network`'s chain.
    ///
    /// Issues nothing if the wallet is already there. Otherwise asks it to
    /// switch; a wallet that does not know the chain (4902) is asked to add
    /// it and then to switch once more.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::UnsupportedNetwork`] for an unknown network
    /// and [`PaymentError::ChainSwitchFailed`] for any wallet failure.
    #[instrument(skip(self, wallet), level = "debug")]
    pub async fn ensure_chain<W: Eip1193Provider + ?Sized>(
        &self,
        wallet: &W,
        network: &str,
    ) -> Result<(), PaymentError> {
        let config = self
            .networks
            .by_name(network)
            .ok_or_else(|| PaymentError::UnsupportedNetwork(network.to_owned()))?;
        let target = config.chain_id;
        let failed = |e: ProviderRpcError| PaymentError::ChainSwitchFailed {
            chain_id: target,
            reason: e.to_string(),
        };

        let current = wallet::chain_id(wallet).await.map_err(failed)?;
        if current == target {
            debug!(chain_id = target, "wallet already on target chain");
            return Ok(());
        }

        debug!(from = current, to = target, "switching wallet chain");
        match wallet::switch_chain(wallet, target).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unrecognized_chain() => {
                debug!(chain_id = target, "chain unknown to wallet, adding it");
                wallet::add_chain(wallet, &AddChainParams::from(config))
                    .await
                    .map_err(failed)?;
                wallet::switch_chain(wallet, target).await.map_err(failed)
            }
            Err(e) => Err(failed(e)),
        }
    }
}
