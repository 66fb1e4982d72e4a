use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Bytes, Signature, U256};
use base64::prelude::*;
use proxy402::BoxFuture;
use proxy402_evm::{DomainMetadata, Eip1193TokenReader, PrivateKeySigner, ProviderRpcError};
use serde_json::{Value, json};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

struct CountingSigner {
    key: PrivateKeySigner,
    calls: AtomicUsize,
}

impl CountingSigner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            key: PrivateKeySigner::random(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PaymentSigner for CountingSigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, PaymentError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PaymentSigner::sign_typed_data(&self.key, typed_data)
    }
}

struct FixedBalance(u64);

impl TokenReader for FixedBalance {
    fn balance_of<'a>(
        &'a self,
        _chain_id: u64,
        _asset: Address,
        _owner: Address,
    ) -> BoxFuture<'a, Result<U256, PaymentError>> {
        let balance = U256::from(self.0);
        Box::pin(async move { Ok(balance) })
    }

    fn version<'a>(
        &'a self,
        _chain_id: u64,
        _asset: Address,
    ) -> BoxFuture<'a, Result<String, PaymentError>> {
        Box::pin(async { Ok("2".to_owned()) })
    }
}

/// A wallet that records every method it is asked, follows switch requests
/// and reports a balance of 10 USDC to `eth_call`.
struct ChainWallet {
    chain_id: Mutex<String>,
    methods: Mutex<Vec<String>>,
}

impl ChainWallet {
    fn on(chain_id: &str) -> Arc<Self> {
        Arc::new(Self {
            chain_id: Mutex::new(chain_id.to_owned()),
            methods: Mutex::new(Vec::new()),
        })
    }

    fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}

impl Eip1193Provider for ChainWallet {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ProviderRpcError>> {
        self.methods.lock().unwrap().push(method.to_owned());
        let mut chain_id = self.chain_id.lock().unwrap();
        let result = match method {
            "eth_chainId" => json!(chain_id.clone()),
            "wallet_switchEthereumChain" => {
                *chain_id = params[0]["chainId"].as_str().unwrap().to_owned();
                Value::Null
            }
            "eth_call" => json!(format!("0x{:064x}", 10_000_000u64)),
            _ => Value::Null,
        };
        Box::pin(async move { Ok(result) })
    }
}

fn requirements(network: &str, max_timeout_seconds: u64) -> Value {
    json!({
        "scheme": "exact",
        "network": network,
        "maxAmountRequired": "1000000",
        "resource": "https://proxy402.com/abc123",
        "description": "Payment for GET https://example.com",
        "mimeType": "",
        "payTo": PAY_TO,
        "maxTimeoutSeconds": max_timeout_seconds,
        "asset": USDC_BASE_SEPOLIA,
        "extra": { "name": "USDC", "version": "2" }
    })
}

/// Mounts a resource that answers 402 with `challenge` until paid, and
/// `paid` once an `X-PAYMENT` header is present.
async fn paywall(challenge: Value, paid: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resource"))
        .and(header_exists(X_PAYMENT_HEADER))
        .respond_with(paid)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(402).set_body_json(challenge))
        .mount(&server)
        .await;
    server
}

fn get(client: &Client, server: &MockServer) -> Request {
    client
        .get(format!("{}/resource", server.uri()))
        .build()
        .unwrap()
}

async fn sent_payments(server: &MockServer) -> Vec<SignedPayment> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.headers.get(X_PAYMENT_HEADER))
        .map(|h| decode_payment(h.to_str().unwrap()).unwrap())
        .collect()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

fn settlement_header(transaction: &str) -> String {
    BASE64_STANDARD.encode(
        json!({
            "success": true,
            "transaction": transaction,
            "network": "base-sepolia",
        })
        .to_string(),
    )
}

#[tokio::test]
async fn test_pays_challenge_and_retries_once() {
    let server = paywall(
        requirements("base-sepolia", 300),
        ResponseTemplate::new(200)
            .insert_header(X_PAYMENT_RESPONSE_HEADER, settlement_header("0xabc").as_str())
            .set_body_string("paid content"),
    )
    .await;
    let signer = CountingSigner::new();
    let payments = PaymentClient::new(signer.clone());
    let http = Client::new();

    let paid = payments.send(&http, get(&http, &server)).await.unwrap();
    assert_eq!(paid.response.status(), StatusCode::OK);
    let receipt = paid.receipt.clone().unwrap();
    assert_eq!(
        receipt.settlement.as_ref().and_then(SettleResponse::transaction),
        Some("0xabc")
    );
    assert_eq!(paid.response.text().await.unwrap(), "paid content");
    assert_eq!(signer.calls(), 1);
    assert_eq!(request_count(&server).await, 2);

    let sent = sent_payments(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], receipt.payment);
    assert_eq!(sent[0].network, "base-sepolia");

    let authorization = sent[0].payload.authorization;
    assert_eq!(authorization.value, TokenAmount::from(1_000_000u64));
    assert_eq!(authorization.from, signer.address());
    assert_eq!(authorization.to, PAY_TO.parse::<Address>().unwrap());
    assert!(authorization.valid_after < authorization.valid_before);
    assert_eq!(
        authorization.valid_before.as_secs() - authorization.valid_after.as_secs(),
        300 + proxy402_evm::authorization::CLOCK_SKEW_MARGIN_SECS
    );

    let typed_data = TypedData::transfer_with_authorization(
        &DomainMetadata::new("USDC", "2"),
        84532,
        USDC_BASE_SEPOLIA.parse().unwrap(),
        authorization,
    );
    let signature = Signature::try_from(sent[0].payload.signature.as_ref()).unwrap();
    assert_eq!(
        signature
            .recover_address_from_prehash(&typed_data.signing_hash())
            .unwrap(),
        signer.address()
    );
}

#[tokio::test]
async fn test_non_402_is_returned_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;
    let signer = CountingSigner::new();
    let http = Client::new();

    let paid = PaymentClient::new(signer.clone())
        .send(&http, get(&http, &server))
        .await
        .unwrap();
    assert_eq!(paid.response.status(), StatusCode::NOT_FOUND);
    assert!(paid.receipt.is_none());
    assert_eq!(signer.calls(), 0);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_empty_balance_fails_before_signing() {
    let server = paywall(requirements("base-sepolia", 300), ResponseTemplate::new(200)).await;
    let signer = CountingSigner::new();
    let http = Client::new();

    let err = PaymentClient::new(signer.clone())
        .with_balance_check(Arc::new(FixedBalance(0)), BalanceCheck::Sufficient)
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::InsufficientFunds { available, .. } if available.is_zero()
    ));
    assert_eq!(signer.calls(), 0);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_partial_balance_depends_on_policy() {
    let server = paywall(requirements("base-sepolia", 300), ResponseTemplate::new(200)).await;
    let http = Client::new();
    let reader = Arc::new(FixedBalance(500_000));

    let err = PaymentClient::new(CountingSigner::new())
        .with_balance_check(reader.clone(), BalanceCheck::Sufficient)
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InsufficientFunds { .. }));

    let paid = PaymentClient::new(CountingSigner::new())
        .with_balance_check(reader, BalanceCheck::NonZero)
        .send(&http, get(&http, &server))
        .await
        .unwrap();
    assert_eq!(paid.response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_second_402_is_rejected_without_third_send() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "x402Version": 1,
            "error": "insufficient_funds",
            "accepts": [requirements("base-sepolia", 300)],
        })))
        .mount(&server)
        .await;
    let signer = CountingSigner::new();
    let http = Client::new();

    let err = PaymentClient::new(signer.clone())
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::PaymentRejected { reason: Some(ref r) } if r == "insufficient_funds"
    ));
    assert_eq!(signer.calls(), 1);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_second_402_naming_expiry() {
    let server = paywall(
        requirements("base-sepolia", 300),
        ResponseTemplate::new(402).set_body_json(json!({ "error": "Authorization expired" })),
    )
    .await;
    let http = Client::new();

    let err = PaymentClient::new(CountingSigner::new())
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::AuthorizationExpired { .. }));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_expired_authorization_is_never_sent() {
    let server = paywall(requirements("base-sepolia", 0), ResponseTemplate::new(200)).await;
    let http = Client::new();

    let err = PaymentClient::new(CountingSigner::new())
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::AuthorizationExpired { .. }));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_wallet_already_on_chain_is_not_switched() {
    let server = paywall(requirements("base-sepolia", 300), ResponseTemplate::new(200)).await;
    let wallet = ChainWallet::on("0x14a34");
    let http = Client::new();

    let paid = PaymentClient::new(CountingSigner::new())
        .with_wallet(wallet.clone())
        .send(&http, get(&http, &server))
        .await
        .unwrap();
    assert_eq!(paid.response.status(), StatusCode::OK);
    assert_eq!(wallet.methods(), vec!["eth_chainId"]);
}

#[tokio::test]
async fn test_wallet_on_other_chain_is_switched() {
    let server = paywall(requirements("base-sepolia", 300), ResponseTemplate::new(200)).await;
    let wallet = ChainWallet::on("0x2105");
    let http = Client::new();

    PaymentClient::new(CountingSigner::new())
        .with_wallet(wallet.clone())
        .send(&http, get(&http, &server))
        .await
        .unwrap();
    assert_eq!(
        wallet.methods(),
        vec!["eth_chainId", "wallet_switchEthereumChain"]
    );
}

#[tokio::test]
async fn test_wallet_balance_read_after_switch() {
    let server = paywall(requirements("base-sepolia", 300), ResponseTemplate::new(200)).await;
    let signer = CountingSigner::new();
    let wallet = ChainWallet::on("0x2105");
    let http = Client::new();

    let paid = PaymentClient::new(signer.clone())
        .with_wallet(wallet.clone())
        .with_balance_check(
            Arc::new(Eip1193TokenReader::new(wallet.clone())),
            BalanceCheck::Sufficient,
        )
        .send(&http, get(&http, &server))
        .await
        .unwrap();
    assert_eq!(paid.response.status(), StatusCode::OK);
    assert_eq!(signer.calls(), 1);
    assert_eq!(
        wallet.methods(),
        vec![
            "eth_chainId",
            "wallet_switchEthereumChain",
            "eth_chainId",
            "eth_call"
        ]
    );
}

#[tokio::test]
async fn test_unknown_network_fails_before_signing() {
    let server = paywall(requirements("solana-devnet", 300), ResponseTemplate::new(200)).await;
    let signer = CountingSigner::new();
    let wallet = ChainWallet::on("0x14a34");
    let http = Client::new();

    let err = PaymentClient::new(signer.clone())
        .with_wallet(wallet.clone())
        .with_balance_check(Arc::new(FixedBalance(10_000_000)), BalanceCheck::Sufficient)
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::UnsupportedNetwork(_)));
    assert_eq!(signer.calls(), 0);
    assert!(wallet.methods().is_empty());
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_network_outside_allow_list() {
    let server = paywall(requirements("base-sepolia", 300), ResponseTemplate::new(200)).await;
    let signer = CountingSigner::new();
    let http = Client::new();

    let err = PaymentClient::new(signer.clone())
        .with_allowed_networks(["base"])
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::UnsupportedNetwork(_)));
    assert_eq!(signer.calls(), 0);
}

#[tokio::test]
async fn test_malformed_challenge() {
    let mut challenge = requirements("base-sepolia", 300);
    challenge.as_object_mut().unwrap().remove("payTo");
    let server = paywall(challenge, ResponseTemplate::new(200)).await;
    let http = Client::new();

    let err = PaymentClient::new(CountingSigner::new())
        .send(&http, get(&http, &server))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::MalformedChallenge(_)));
}

#[tokio::test]
async fn test_caller_supplied_payment_is_sent_as_is() {
    let server = paywall(
        requirements("base-sepolia", 300),
        ResponseTemplate::new(200)
            .insert_header(X_PAYMENT_RESPONSE_HEADER, settlement_header("0xdef").as_str()),
    )
    .await;
    let http = Client::new();
    let payments = PaymentClient::new(CountingSigner::new());
    let original = payments
        .send(&http, get(&http, &server))
        .await
        .unwrap()
        .receipt
        .unwrap();

    let signer = CountingSigner::new();
    let mut request = get(&http, &server);
    request.headers_mut().insert(
        X_PAYMENT_HEADER,
        HeaderValue::from_str(&original.header).unwrap(),
    );
    let paid = PaymentClient::new(signer.clone())
        .send(&http, request)
        .await
        .unwrap();
    assert_eq!(paid.response.status(), StatusCode::OK);
    let receipt = paid.receipt.unwrap();
    assert_eq!(receipt.payment, original.payment);
    assert_eq!(
        receipt.settlement.as_ref().and_then(SettleResponse::transaction),
        Some("0xdef")
    );
    assert_eq!(signer.calls(), 0);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_presigned_payment_needs_no_signer() {
    let server = paywall(
        requirements("base-sepolia", 300),
        ResponseTemplate::new(200)
            .insert_header(X_PAYMENT_RESPONSE_HEADER, settlement_header("0x123").as_str()),
    )
    .await;
    let http = Client::new();
    let original = PaymentClient::new(CountingSigner::new())
        .send(&http, get(&http, &server))
        .await
        .unwrap()
        .receipt
        .unwrap();

    let mut request = get(&http, &server);
    request.headers_mut().insert(
        X_PAYMENT_HEADER,
        HeaderValue::from_str(&original.header).unwrap(),
    );
    let paid = send_presigned(&http, request).await.unwrap();
    assert_eq!(paid.response.status(), StatusCode::OK);
    let receipt = paid.receipt.unwrap();
    assert_eq!(receipt.header, original.header);
    assert_eq!(
        receipt.settlement.as_ref().and_then(SettleResponse::transaction),
        Some("0x123")
    );
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_malformed_settlement_header_is_ignored() {
    let server = paywall(
        requirements("base-sepolia", 300),
        ResponseTemplate::new(200).insert_header(X_PAYMENT_RESPONSE_HEADER, "%%%"),
    )
    .await;
    let http = Client::new();

    let paid = PaymentClient::new(CountingSigner::new())
        .send(&http, get(&http, &server))
        .await
        .unwrap();
    let receipt = paid.receipt.unwrap();
    assert!(receipt.settlement.is_none());
}

#[tokio::test]
async fn test_middleware_stores_receipt() {
    let server = paywall(
        requirements("base-sepolia", 300),
        ResponseTemplate::new(200)
            .insert_header(X_PAYMENT_RESPONSE_HEADER, settlement_header("0x123").as_str()),
    )
    .await;
    let signer = CountingSigner::new();
    let http = Client::new().with_payments(PaymentClient::new(signer.clone())).build();

    let response = http
        .get(format!("{}/resource", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = PaymentReceipt::of(&response).unwrap();
    assert_eq!(receipt.authorization().from, signer.address());
    assert_eq!(
        receipt.settlement.as_ref().and_then(SettleResponse::transaction),
        Some("0x123")
    );
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_middleware_surfaces_payment_errors() {
    let server = paywall(requirements("solana-devnet", 300), ResponseTemplate::new(200)).await;
    let http = ClientBuilder::new()
        .with_payments(PaymentClient::new(CountingSigner::new()))
        .build()
        .unwrap();

    let err = http
        .get(format!("{}/resource", server.uri()))
        .send()
        .await
        .unwrap_err();
    let rqm::Error::Middleware(inner) = err else {
        panic!("expected a middleware error");
    };
    assert!(matches!(
        inner.downcast_ref::<PaymentError>(),
        Some(PaymentError::UnsupportedNetwork(_))
    ));
}
