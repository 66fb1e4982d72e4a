//! Fetch a resource, paying for it with x402 if the server asks.
//!
//! # Usage
//!
//! ```bash
//! # Pay with the key in PRIVATE_KEY (or .env)
//! proxy402 https://proxy402.com/abc123
//!
//! # POST a body, only paying on Base Sepolia, after checking the balance
//! proxy402 -X POST -d '{"q":1}' --network base-sepolia --check-balance https://example.com/api
//!
//! # Replay a payment header produced earlier (no key needed)
//! proxy402 --payment-header "$X_PAYMENT" https://proxy402.com/abc123
//! ```
//!
//! # Environment Variables
//!
//! - `PRIVATE_KEY` - Payer private key (hex)
//! - `CONFIG` - Path to TOML configuration file (default: `proxy402.toml`)
//! - `RUST_LOG` - Log level filter (default: `info`, `debug` with `-v`)

use std::sync::Arc;

use clap::Parser;
use proxy402_evm::{EvmNetworks, NetworkResolver, PrivateKeySigner, RpcTokenReader};
use proxy402_http::constants::X_PAYMENT_HEADER;
use proxy402_http::{BalanceCheck, PaymentClient, send_presigned};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use tracing_subscriber::EnvFilter;
use url::Url;

use proxy402_cli::{CliError, ClientConfig};

#[derive(Debug, Parser)]
#[command(name = "proxy402", version, about = "Fetch a URL, paying x402 challenges")]
struct Args {
    /// The resource to fetch.
    url: Url,

    /// HTTP method.
    #[arg(short = 'X', long = "request", default_value = "GET")]
    method: Method,

    /// Extra request header, as `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body.
    #[arg(short, long)]
    data: Option<String>,

    /// Only pay on this network.
    #[arg(long)]
    network: Option<String>,

    /// Send this pre-signed `X-PAYMENT` value instead of signing.
    #[arg(long, env = "X_PAYMENT")]
    payment_header: Option<String>,

    /// Refuse to sign when the balance does not cover the amount.
    #[arg(long)]
    check_balance: bool,

    /// Payer private key (hex).
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Builds the signing client from the key and network settings.
fn payment_client(
    args: &Args,
    config: &ClientConfig,
    networks: EvmNetworks,
) -> Result<PaymentClient, Box<dyn std::error::Error>> {
    let key = args
        .private_key
        .as_deref()
        .or(config.private_key.as_deref())
        .ok_or(CliError::MissingKey)?;
    let signer: PrivateKeySigner = key
        .trim()
        .parse()
        .map_err(|e| CliError::InvalidKey(format!("{e}")))?;
    tracing::info!(payer = %signer.address(), "loaded signer");

    let reader = Arc::new(RpcTokenReader::from_networks(&networks)?);
    let resolver = NetworkResolver::new(networks).with_token_reader(Arc::<RpcTokenReader>::clone(&reader));
    let mut payments = PaymentClient::new(signer).with_resolver(Arc::new(resolver));
    if args.check_balance || config.check_balance {
        payments = payments.with_balance_check(reader, BalanceCheck::Sufficient);
    }
    Ok(payments)
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load()?;
    let allowed = args
        .network
        .clone()
        .map(|n| vec![n])
        .or_else(|| config.allowed_networks.clone());
    let networks = match &allowed {
        Some(names) => config.networks()?.restricted_to(names),
        None => config.networks()?,
    };

    let payments = if args.payment_header.is_some() {
        None
    } else {
        let mut payments = payment_client(&args, &config, networks.clone())?;
        if let Some(allowed) = allowed {
            payments = payments.with_allowed_networks(allowed);
        }
        Some(payments)
    };

    let http = reqwest::Client::new();
    let mut builder = http.request(args.method.clone(), args.url.clone());
    for header in &args.headers {
        let (name, value) = parse_header(header)?;
        builder = builder.header(name, value);
    }
    if let Some(payment) = &args.payment_header {
        builder = builder.header(X_PAYMENT_HEADER, payment.trim());
    }
    if let Some(data) = &args.data {
        builder = builder.body(data.clone());
    }
    let request = builder.build().map_err(CliError::from)?;

    let paid = match &payments {
        Some(payments) => payments.send(&http, request).await,
        None => send_presigned(&http, request).await,
    }
    .map_err(CliError::from)?;
    let status = paid.response.status();
    if let Some(receipt) = &paid.receipt {
        let authorization = receipt.authorization();
        let decimals = networks
            .by_name(&receipt.payment.network)
            .and_then(|n| n.default_asset())
            .map_or(6, |a| a.decimals);
        tracing::info!(
            network = %receipt.payment.network,
            amount = %authorization.value.format_units(decimals),
            to = %authorization.to,
            valid_before = %authorization.valid_before,
            "paid"
        );
        match &receipt.settlement {
            Some(settlement) if settlement.is_success() => tracing::info!(
                transaction = settlement.transaction(),
                "settled"
            ),
            Some(settlement) => tracing::warn!(?settlement, "settlement failed"),
            None => tracing::info!("no settlement reported"),
        }
    }
    if status.is_success() {
        tracing::info!(%status, "response");
    } else {
        tracing::warn!(%status, "response");
    }

    let body = paid.response.text().await.map_err(CliError::from)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{body}");
    }
    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), CliError> {
    let invalid = || CliError::InvalidHeader(raw.to_owned());
    let (name, value) = raw.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((name, value))
}
