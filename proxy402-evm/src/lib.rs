#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) support for the Proxy402 x402 payment client.
//!
//! This crate turns a parsed payment challenge into a signed ERC-3009
//! `transferWithAuthorization`: it resolves the network and the token's
//! EIP-712 domain, moves an EIP-1193 wallet to the right chain, builds a
//! single-use authorization and signs it, either with a local key or by
//! delegating to the wallet.
//!
//! # Modules
//!
//! - [`chain`] - Chain IDs, native currencies and token deployments
//! - [`networks`] - The built-in network table ([`EvmNetworks`])
//! - [`exact`] - Wire types of the "exact" scheme
//! - [`authorization`] - Authorization windows and nonces
//! - [`typed_data`] - EIP-712 documents for `eth_signTypedData_v4`
//! - [`signer`] - The [`PaymentSigner`] capability and its implementations
//! - [`wallet`] - The EIP-1193 request channel and chain-management calls
//! - [`reader`] - Token `balanceOf` / `version()` reads
//! - [`resolver`] - The [`NetworkResolver`]

pub mod authorization;
pub mod chain;
pub mod contract;
pub mod exact;
pub mod networks;
pub mod reader;
pub mod resolver;
pub mod signer;
pub mod typed_data;
pub mod wallet;

pub use networks::EvmNetworks;
pub use reader::{Eip1193TokenReader, RpcTokenReader, TokenReader};
pub use resolver::NetworkResolver;
pub use signer::{PaymentSigner, WalletSigner};
pub use typed_data::{DomainMetadata, TypedData};
pub use wallet::{Eip1193Provider, ProviderRpcError};

pub use alloy_signer_local::PrivateKeySigner;
