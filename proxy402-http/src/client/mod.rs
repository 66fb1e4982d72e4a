//! Automatic payment of `402 Payment Required` responses.
//!
//! [`PaymentClient`] runs one request through the payment flow:
//!
//! 1. Send the request unmodified. A request that already carries
//!    `X-PAYMENT` is sent as-is and never paid again.
//! 2. Hand back anything that is not a 402.
//! 3. Resolve the challenge's network and, when configured, check the
//!    payer's balance and move the wallet to the right chain.
//! 4. Build, sign and encode an ERC-3009 authorization.
//! 5. Retry the request exactly once with the `X-PAYMENT` header.
//!
//! The same steps back [`PaymentClient::send`] and the
//! [`reqwest_middleware::Middleware`] implementation, which stores the
//! [`PaymentReceipt`] in the response extensions.

mod middleware;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use alloy_primitives::Address;
use http::{HeaderMap, HeaderValue, StatusCode};
use proxy402::proto::{ExactScheme, SettleResponse, UnixTimestamp, V1};
use proxy402::{PaymentError, TokenAmount};
use proxy402_evm::authorization::build_authorization;
use proxy402_evm::exact::{
    Eip3009Authorization, ExactEvmPayload, PaymentRequirements, PaymentRequirementsExtra,
    SignedPayment,
};
use proxy402_evm::{Eip1193Provider, NetworkResolver, PaymentSigner, TokenReader, TypedData};
use reqwest::{Client, ClientBuilder, Request, Response};
use reqwest_middleware as rqm;
use tracing::{debug, info, instrument, warn};

use crate::challenge::{self, PaymentChallenge};
use crate::constants::{X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER};
use crate::headers::{decode_payment, decode_payment_response, encode_payment};

/// How strictly the payer's token balance is checked before signing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BalanceCheck {
    /// Only refuse an empty balance.
    NonZero,
    /// Refuse any balance below `maxAmountRequired`.
    #[default]
    Sufficient,
}

impl BalanceCheck {
    fn covers(self, balance: TokenAmount, required: TokenAmount) -> bool {
        match self {
            Self::NonZero => !balance.is_zero(),
            Self::Sufficient => balance >= required,
        }
    }
}

/// What was paid for a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The exact `X-PAYMENT` header value that was sent.
    pub header: String,
    /// The signed payment the header encodes.
    pub payment: SignedPayment,
    /// The decoded `X-PAYMENT-RESPONSE` header, if the server sent one.
    pub settlement: Option<SettleResponse>,
}

impl PaymentReceipt {
    /// The signed authorization.
    #[must_use]
    pub const fn authorization(&self) -> &Eip3009Authorization {
        &self.payment.payload.authorization
    }

    /// Reads the receipt the middleware attached to `response`.
    #[must_use]
    pub fn of(response: &Response) -> Option<&Self> {
        response.extensions().get::<Self>()
    }
}

/// A response returned by [`PaymentClient::send`].
#[derive(Debug)]
pub struct PaidResponse {
    /// The final response.
    pub response: Response,
    /// Present when this client paid for the response, or when the caller
    /// supplied a decodable `X-PAYMENT` header.
    pub receipt: Option<PaymentReceipt>,
}

impl PaidResponse {
    /// Moves the receipt into the response extensions.
    pub(crate) fn into_response(self) -> Response {
        let mut response = self.response;
        if let Some(receipt) = self.receipt {
            response.extensions_mut().insert(receipt);
        }
        response
    }
}

/// The first response of a request, classified.
#[derive(Debug)]
pub(crate) enum FirstResponse {
    PassThrough(Response),
    Challenge(PaymentChallenge),
}

/// A payment signed for a challenge, ready to attach to the retry.
#[derive(Debug)]
pub(crate) struct PreparedPayment {
    header: String,
    payment: SignedPayment,
}

impl PreparedPayment {
    pub(crate) fn attach(&self, request: &mut Request) -> Result<(), PaymentError> {
        let value = HeaderValue::from_str(&self.header)
            .map_err(|e| PaymentError::MalformedPaymentHeader(e.to_string()))?;
        request.headers_mut().insert(X_PAYMENT_HEADER, value);
        Ok(())
    }
}

/// Pays `402 Payment Required` responses with signed ERC-3009 authorizations.
///
/// Built once and shared; it keeps no per-request state. Which signer,
/// wallet and reader it uses is fixed at construction.
#[derive(Clone)]
pub struct PaymentClient {
    signer: Arc<dyn PaymentSigner>,
    resolver: Arc<NetworkResolver>,
    wallet: Option<Arc<dyn Eip1193Provider>>,
    balance_check: Option<(Arc<dyn TokenReader>, BalanceCheck)>,
    allowed_networks: Option<Vec<String>>,
}

impl fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentClient")
            .field("payer", &self.signer.address())
            .field("resolver", &self.resolver)
            .field("manages_wallet_chain", &self.wallet.is_some())
            .field("balance_check", &self.balance_check.as_ref().map(|(_, c)| c))
            .field("allowed_networks", &self.allowed_networks)
            .finish()
    }
}

impl PaymentClient {
    /// Creates a client that signs with `signer` over the built-in networks.
    pub fn new<S: PaymentSigner + 'static>(signer: S) -> Self {
        Self {
            signer: Arc::new(signer),
            resolver: Arc::new(NetworkResolver::default()),
            wallet: None,
            balance_check: None,
            allowed_networks: None,
        }
    }

    /// Uses `resolver` for network, asset and domain lookups.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<NetworkResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Moves `wallet` to the challenge's chain before signing.
    #[must_use]
    pub fn with_wallet<W: Eip1193Provider + 'static>(mut self, wallet: Arc<W>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Reads the payer's balance through `reader` before signing.
    #[must_use]
    pub fn with_balance_check<R: TokenReader + 'static>(
        mut self,
        reader: Arc<R>,
        check: BalanceCheck,
    ) -> Self {
        self.balance_check = Some((reader, check));
        self
    }

    /// Only pays challenges on the named networks.
    #[must_use]
    pub fn with_allowed_networks<I, N>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.allowed_networks = Some(networks.into_iter().map(Into::into).collect());
        self
    }

    /// The address payments are signed for.
    #[must_use]
    pub fn payer(&self) -> Address {
        self.signer.address()
    }

    /// Sends `request` through `client`, paying a 402 challenge if one comes back.
    ///
    /// # Errors
    ///
    /// Any [`PaymentError`]; [`PaymentError::class`] tells how to react.
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    pub async fn send(
        &self,
        client: &Client,
        request: Request,
    ) -> Result<PaidResponse, PaymentError> {
        if request.headers().contains_key(X_PAYMENT_HEADER) {
            debug!("request carries its own payment, sending as-is");
            return send_presigned(client, request).await;
        }

        let retry = request.try_clone();
        debug!(state = "awaiting_first_response");
        let response = client.execute(request).await.map_err(transport)?;
        let challenge = match self.classify(response).await? {
            FirstResponse::PassThrough(response) => {
                return Ok(PaidResponse {
                    response,
                    receipt: None,
                });
            }
            FirstResponse::Challenge(challenge) => challenge,
        };

        let mut retry = retry.ok_or(PaymentError::RequestNotCloneable)?;
        let prepared = self.prepare_payment(&challenge).await?;
        prepared.attach(&mut retry)?;
        debug!(state = "retrying");
        let response = client.execute(retry).await.map_err(transport)?;
        self.finish(prepared, response).await
    }

    /// Returns non-402 responses untouched and parses 402 challenges.
    pub(crate) async fn classify(&self, response: Response) -> Result<FirstResponse, PaymentError> {
        let status = response.status();
        if status != StatusCode::PAYMENT_REQUIRED {
            debug!(%status, state = "success", "no payment required");
            return Ok(FirstResponse::PassThrough(response));
        }
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport)?;
        let challenge = challenge::parse_payment_required(&headers, &body)?;
        debug!(
            state = "challenge_received",
            network = %challenge.requirements.network,
            amount = %challenge.requirements.max_amount_required,
            "payment required"
        );
        Ok(FirstResponse::Challenge(challenge))
    }

    /// Turns a challenge into a signed, encoded payment.
    #[instrument(skip_all, fields(network = %challenge.requirements.network), err)]
    pub(crate) async fn prepare_payment(
        &self,
        challenge: &PaymentChallenge,
    ) -> Result<PreparedPayment, PaymentError> {
        let network = challenge.requirements.network.as_str();
        if let Some(allowed) = &self.allowed_networks {
            if !allowed.iter().any(|n| n == network) {
                return Err(PaymentError::UnsupportedNetwork(format!(
                    "{network} is not an allowed network"
                )));
            }
        }
        let chain_id = self.resolver.chain_id_for(network)?;
        let requirements: PaymentRequirements = challenge
            .requirements
            .as_concrete::<ExactScheme, Address, PaymentRequirementsExtra>()?;
        let payer = self.signer.address();

        // A wallet-bound reader can only see the chain the wallet is on.
        let switch_first = self
            .balance_check
            .as_ref()
            .is_some_and(|(reader, _)| reader.follows_wallet_chain());
        if switch_first {
            self.ensure_wallet_chain(network).await?;
        }

        if let Some((reader, check)) = &self.balance_check {
            let balance = TokenAmount::from(
                reader
                    .balance_of(chain_id, requirements.asset, payer)
                    .await?,
            );
            let required = requirements.max_amount_required;
            debug!(%balance, %required, "checked payer balance");
            if !check.covers(balance, required) {
                return Err(PaymentError::InsufficientFunds {
                    required,
                    available: balance,
                });
            }
        }

        if !switch_first {
            self.ensure_wallet_chain(network).await?;
        }

        debug!(state = "building_payment", chain_id);
        let authorization = build_authorization(&requirements, payer, UnixTimestamp::now());
        let domain = self
            .resolver
            .domain_for(network, requirements.asset, requirements.extra.as_ref())
            .await;
        let typed_data = TypedData::transfer_with_authorization(
            &domain,
            chain_id,
            requirements.asset,
            authorization,
        );

        debug!(state = "signing", %payer);
        let signature = self.signer.sign_typed_data(&typed_data).await?;
        let payment = SignedPayment {
            x402_version: V1,
            scheme: ExactScheme,
            network: network.to_owned(),
            payload: ExactEvmPayload {
                signature,
                authorization,
            },
        };
        let header = encode_payment(&payment)?;

        if authorization.is_expired_at(UnixTimestamp::now()) {
            return Err(PaymentError::AuthorizationExpired {
                valid_before: authorization.valid_before,
            });
        }
        Ok(PreparedPayment { header, payment })
    }

    async fn ensure_wallet_chain(&self, network: &str) -> Result<(), PaymentError> {
        match &self.wallet {
            Some(wallet) => self.resolver.ensure_chain(wallet.as_ref(), network).await,
            None => Ok(()),
        }
    }

    /// Interprets the answer to the paid retry.
    pub(crate) async fn finish(
        &self,
        prepared: PreparedPayment,
        response: Response,
    ) -> Result<PaidResponse, PaymentError> {
        let authorization = prepared.payment.payload.authorization;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(transport)?;
            let reason = challenge::parse_payment_required(&headers, &body)
                .ok()
                .and_then(|c| c.error)
                .or_else(|| challenge::error_message(&body));
            debug!(state = "failed", reason = reason.as_deref(), "paid retry refused");
            if names_expiry(reason.as_deref())
                || authorization.is_expired_at(UnixTimestamp::now())
            {
                return Err(PaymentError::AuthorizationExpired {
                    valid_before: authorization.valid_before,
                });
            }
            return Err(PaymentError::PaymentRejected { reason });
        }

        let settlement = read_settlement(response.headers());
        info!(
            status = %response.status(),
            value = %authorization.value,
            transaction = settlement.as_ref().and_then(SettleResponse::transaction),
            "payment accepted"
        );
        Ok(PaidResponse {
            response,
            receipt: Some(PaymentReceipt {
                header: prepared.header,
                payment: prepared.payment,
                settlement,
            }),
        })
    }
}

fn names_expiry(reason: Option<&str>) -> bool {
    reason.is_some_and(|r| r.to_ascii_lowercase().contains("expire"))
}

/// Receipt for a caller-supplied `X-PAYMENT` header, if it decodes.
/// Sends a request that already carries an `X-PAYMENT` header.
///
/// Nothing is signed, so no [`PaymentClient`] is needed. The receipt is
/// decoded from the caller's header and completed with the server's
/// settlement, if any.
///
/// # Errors
///
/// [`PaymentError::TransportError`] if the request fails.
pub async fn send_presigned(
    client: &Client,
    request: Request,
) -> Result<PaidResponse, PaymentError> {
    let receipt = presigned_receipt(request.headers());
    let response = client.execute(request).await.map_err(transport)?;
    Ok(with_settlement(response, receipt))
}

pub(crate) fn presigned_receipt(headers: &HeaderMap) -> Option<PaymentReceipt> {
    let header = headers.get(X_PAYMENT_HEADER)?.to_str().ok()?;
    match decode_payment(header) {
        Ok(payment) => Some(PaymentReceipt {
            header: header.to_owned(),
            payment,
            settlement: None,
        }),
        Err(e) => {
            debug!(error = %e, "caller-supplied payment header does not decode");
            None
        }
    }
}

pub(crate) fn with_settlement(
    response: Response,
    receipt: Option<PaymentReceipt>,
) -> PaidResponse {
    let receipt = receipt.map(|receipt| PaymentReceipt {
        settlement: read_settlement(response.headers()),
        ..receipt
    });
    PaidResponse { response, receipt }
}

fn read_settlement(headers: &HeaderMap) -> Option<SettleResponse> {
    let header = headers.get(X_PAYMENT_RESPONSE_HEADER)?;
    let decoded = header
        .to_str()
        .map_err(|e| PaymentError::MalformedPaymentHeader(e.to_string()))
        .and_then(decode_payment_response);
    match decoded {
        Ok(settlement) => Some(settlement),
        Err(e) => {
            warn!(error = %e, "ignoring malformed {X_PAYMENT_RESPONSE_HEADER} header");
            None
        }
    }
}

fn transport(error: reqwest::Error) -> PaymentError {
    PaymentError::TransportError(error.to_string())
}

/// Adds payment handling to reqwest clients.
///
/// Implemented on [`Client`] and [`ClientBuilder`].
pub trait ReqwestWithPayments<A> {
    /// Wraps the client with `payments` as middleware.
    fn with_payments(self, payments: PaymentClient) -> ReqwestWithPaymentsBuilder<A>;
}

impl ReqwestWithPayments<Self> for Client {
    fn with_payments(self, payments: PaymentClient) -> ReqwestWithPaymentsBuilder<Self> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            payments,
        }
    }
}

impl ReqwestWithPayments<Self> for ClientBuilder {
    fn with_payments(self, payments: PaymentClient) -> ReqwestWithPaymentsBuilder<Self> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            payments,
        }
    }
}

/// Builder for a reqwest client with payment middleware.
#[allow(missing_debug_implementations)] // generic A may not implement Debug
pub struct ReqwestWithPaymentsBuilder<A> {
    inner: A,
    payments: PaymentClient,
}

/// Builds the final client from a [`ReqwestWithPaymentsBuilder`].
pub trait ReqwestWithPaymentsBuild {
    /// The type returned by [`build`](Self::build).
    type BuildResult;
    /// The type returned by [`builder`](Self::builder).
    type BuilderResult;

    /// Builds the client, consuming the builder.
    fn build(self) -> Self::BuildResult;

    /// Returns the middleware client builder, to add further middleware.
    fn builder(self) -> Self::BuilderResult;
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client> {
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.payments)
    }
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder> {
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        Ok(self.builder()?.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.payments))
    }
}
