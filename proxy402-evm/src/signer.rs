//! Signing capability for payment authorizations.
//!
//! [`PaymentSigner`] is chosen once when the client is built; call sites
//! never branch on which implementation they hold.
//!
//! - [`PrivateKeySigner`] hashes the typed data locally and signs the hash.
//! - [`WalletSigner`] forwards the typed data to an EIP-1193 wallet with
//!   `eth_signTypedData_v4`.
//!
//! For the same key and document both produce the same signature bytes.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use alloy_signer_local::PrivateKeySigner;
use proxy402::{BoxFuture, PaymentError};
use serde_json::{Value, json};
use tracing::debug;

use crate::typed_data::TypedData;
use crate::wallet::{self, Eip1193Provider, ProviderRpcError};

/// Produces signatures over EIP-712 typed data for one payer address.
pub trait PaymentSigner: Send + Sync {
    /// The payer address signatures are produced for.
    fn address(&self) -> Address;

    /// Signs the typed data, returning the raw signature bytes.
    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, PaymentError>>;
}

impl PaymentSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, PaymentError>> {
        Box::pin(async move {
            let hash = typed_data.signing_hash();
            let signature = alloy_signer::Signer::sign_hash(self, &hash)
                .await
                .map_err(local_signing_error)?;
            Ok(signature.as_bytes().into())
        })
    }
}

impl<T: PaymentSigner + ?Sized> PaymentSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, PaymentError>> {
        (**self).sign_typed_data(typed_data)
    }
}

/// Delegates signing to an EIP-1193 wallet.
#[derive(Debug, Clone)]
pub struct WalletSigner<W> {
    wallet: Arc<W>,
    address: Address,
    timeout: Option<Duration>,
}

impl<W: Eip1193Provider> WalletSigner<W> {
    /// Creates a signer for `address`, an account the wallet controls.
    pub const fn new(wallet: Arc<W>, address: Address) -> Self {
        Self {
            wallet,
            address,
            timeout: None,
        }
    }

    /// Creates a signer for the wallet's first account (`eth_requestAccounts`).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::SigningDeclined`] if the user refuses the
    /// connection, or [`PaymentError::TransportError`] for other failures.
    pub async fn connect(wallet: Arc<W>) -> Result<Self, PaymentError> {
        let address = wallet::request_account(wallet.as_ref())
            .await
            .map_err(signing_error)?;
        Ok(Self::new(wallet, address))
    }

    /// Gives up on a pending signature after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the wrapped wallet.
    pub fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    async fn request_signature(&self, typed_data: &TypedData) -> Result<Bytes, PaymentError> {
        let document = serde_json::to_string(typed_data).map_err(|e| {
            PaymentError::TransportError(format!("cannot serialize typed data: {e}"))
        })?;
        let params = json!([self.address, document]);
        debug!(address = %self.address, "requesting eth_signTypedData_v4");
        let request = self.wallet.request("eth_signTypedData_v4", params);
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| {
                    PaymentError::SigningDeclined(format!(
                        "no signature within {}s",
                        timeout.as_secs()
                    ))
                })?,
            None => request.await,
        };
        let value = result.map_err(signing_error)?;
        parse_signature(&value)
    }
}

impl<W: Eip1193Provider> PaymentSigner for WalletSigner<W> {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, PaymentError>> {
        Box::pin(self.request_signature(typed_data))
    }
}

fn local_signing_error(error: alloy_signer::Error) -> PaymentError {
    PaymentError::TransportError(format!("local signing failed: {error}"))
}

fn signing_error(error: ProviderRpcError) -> PaymentError {
    if error.is_user_rejection() {
        PaymentError::SigningDeclined(error.message)
    } else {
        PaymentError::TransportError(error.to_string())
    }
}

fn parse_signature(value: &Value) -> Result<Bytes, PaymentError> {
    value
        .as_str()
        .and_then(|hex| hex.parse::<Bytes>().ok())
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| {
            PaymentError::TransportError(format!("invalid signature from wallet: {value}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::Eip3009Authorization;
    use crate::networks::{BASE_SEPOLIA, USDC_BASE_SEPOLIA};
    use crate::typed_data::DomainMetadata;
    use crate::wallet::testing::FakeWallet;
    use alloy_primitives::{B256, address};
    use proxy402::TokenAmount;
    use proxy402::proto::UnixTimestamp;

    #[test]
    fn test_local_failure_is_not_a_decline() {
        let err = local_signing_error(alloy_signer::Error::other("hash unavailable"));
        assert!(
            matches!(err, PaymentError::TransportError(ref m) if m.contains("hash unavailable"))
        );
    }

    /// A wallet that signs like a browser extension would: it parses the
    /// JSON document it receives and signs with its own key.
    struct KeyBackedWallet(PrivateKeySigner);

    impl Eip1193Provider for KeyBackedWallet {
        fn request<'a>(
            &'a self,
            method: &'a str,
            params: Value,
        ) -> BoxFuture<'a, Result<Value, ProviderRpcError>> {
            Box::pin(async move {
                assert_eq!(method, "eth_signTypedData_v4");
                let account: Address = params[0].as_str().unwrap().parse().unwrap();
                assert_eq!(account, self.0.address());
                let typed: TypedData = serde_json::from_str(params[1].as_str().unwrap()).unwrap();
                let signature = PaymentSigner::sign_typed_data(&self.0, &typed).await.unwrap();
                Ok(Value::String(signature.to_string()))
            })
        }
    }

    fn typed_data(from: Address) -> TypedData {
        TypedData::transfer_with_authorization(
            &DomainMetadata::new("USDC", "2"),
            BASE_SEPOLIA,
            USDC_BASE_SEPOLIA,
            Eip3009Authorization {
                from,
                to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"),
                value: TokenAmount::from(1_000_000u64),
                valid_after: UnixTimestamp::from_secs(1_740_672_089),
                valid_before: UnixTimestamp::from_secs(1_740_672_389),
                nonce: B256::repeat_byte(0xab),
            },
        )
    }

    #[tokio::test]
    async fn test_key_and_wallet_signatures_match() {
        let key = PrivateKeySigner::random();
        let address = key.address();
        let data = typed_data(address);

        let local = PaymentSigner::sign_typed_data(&key, &data).await.unwrap();
        let wallet = WalletSigner::new(Arc::new(KeyBackedWallet(key)), address);
        let delegated = wallet.sign_typed_data(&data).await.unwrap();

        assert_eq!(local.len(), 65);
        assert_eq!(local, delegated);
    }

    #[tokio::test]
    async fn test_local_signature_recovers_payer() {
        let key = PrivateKeySigner::random();
        let data = typed_data(key.address());
        let bytes = PaymentSigner::sign_typed_data(&key, &data).await.unwrap();
        let signature = alloy_primitives::Signature::try_from(bytes.as_ref()).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&data.signing_hash())
            .unwrap();
        assert_eq!(recovered, key.address());
    }

    #[tokio::test]
    async fn test_user_rejection_is_declined() {
        let wallet = FakeWallet::default().on(
            "eth_signTypedData_v4",
            Err(ProviderRpcError::new(4001, "User rejected the request.")),
        );
        let signer = WalletSigner::new(Arc::new(wallet), Address::ZERO);
        let err = signer
            .sign_typed_data(&typed_data(Address::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::SigningDeclined(_)));
    }

    #[tokio::test]
    async fn test_other_wallet_errors_are_transport() {
        let wallet = FakeWallet::default().on(
            "eth_signTypedData_v4",
            Err(ProviderRpcError::new(-32603, "disconnected")),
        );
        let signer = WalletSigner::new(Arc::new(wallet), Address::ZERO);
        let err = signer
            .sign_typed_data(&typed_data(Address::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::TransportError(_)));
    }

    struct SilentWallet;

    impl Eip1193Provider for SilentWallet {
        fn request<'a>(
            &'a self,
            _method: &'a str,
            _params: Value,
        ) -> BoxFuture<'a, Result<Value, ProviderRpcError>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_declined() {
        let signer = WalletSigner::new(Arc::new(SilentWallet), Address::ZERO)
            .with_timeout(Duration::from_millis(20));
        let err = signer
            .sign_typed_data(&typed_data(Address::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::SigningDeclined(_)));
    }
}
