//! rrrpay
//!
//! Operator CLI for the RRR stablecoin payment core.
//!
//! Commands:
//! 1. `reference` creates a payment reference for an invoice
//! 2. `request` creates a reference and prints its payment URI and QR
//! 3. `verify` searches the ledger for the transfer of an earlier reference

mod config;

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rrrpay_core::{
    qr, ExchangeRate, FiatAmount, FixedRateProvider, Invoice, PaymentGateway, PaymentReference,
    RateDirection, RateProvider, ReferenceKey, SolanaRpcClient,
};

use crate::config::ToolsConfig;

#[derive(Parser)]
#[command(
    name = "rrrpay",
    about = "Settle RRR invoices with SPL stable tokens"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a payment reference and print its key, memo and bound rate.
    Reference(ReferenceArgs),
    /// Create a reference and print the payment URI for an invoice amount.
    Request(RequestArgs),
    /// Verify that the transfer for a reference reached the merchant.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct ReferenceArgs {
    /// Remita retrieval reference of the invoice.
    #[arg(long)]
    rrr: String,
}

#[derive(Args)]
struct RequestArgs {
    #[arg(long)]
    rrr: String,
    /// Invoice amount in NGN.
    #[arg(long)]
    amount: Decimal,
    /// Write the QR code PNG to this path.
    #[arg(long)]
    png: Option<PathBuf>,
    /// Print the QR code to the terminal.
    #[arg(long)]
    show_qr: bool,
}

#[derive(Args)]
struct VerifyArgs {
    /// Base58 reference key printed by `reference` or `request`.
    #[arg(long)]
    reference: String,
    #[arg(long)]
    rrr: String,
    /// Invoice amount in NGN.
    #[arg(long)]
    amount: Decimal,
    /// Rate bound to the reference when it was created.
    #[arg(long)]
    rate: Decimal,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rrrpay_core=info,rrrpay=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = ToolsConfig::from_env()?;

    match cli.command {
        Commands::Reference(args) => reference_cmd(&config, args).await,
        Commands::Request(args) => request_cmd(&config, args).await,
        Commands::Verify(args) => verify_cmd(&config, args).await,
    }
}

fn gateway(
    config: &ToolsConfig,
    rates: Arc<dyn RateProvider>,
) -> Result<PaymentGateway<Arc<dyn RateProvider>, SolanaRpcClient>> {
    let ledger = SolanaRpcClient::new(config.rpc_config())?;
    Ok(PaymentGateway::new(rates, ledger, config.payment_config()))
}

async fn reference_cmd(config: &ToolsConfig, args: ReferenceArgs) -> Result<()> {
    let gateway = gateway(config, config.rate_provider()?)?;
    let invoice = Invoice::new(args.rrr, FiatAmount::new(Decimal::ZERO)?, "");

    let reference = gateway
        .create_invoice_reference(&invoice)
        .await
        .context("failed to create payment reference")?;

    print_json(&json!({
        "reference": reference.key().to_base58(),
        "memo": reference.memo(),
        "rate": reference.rate_value().to_string(),
        "createdAt": reference.created_at(),
        "expiresInSecs": gateway.time_remaining(&reference).as_secs(),
    }))
}

async fn request_cmd(config: &ToolsConfig, args: RequestArgs) -> Result<()> {
    let gateway = gateway(config, config.rate_provider()?)?;
    let invoice = Invoice::new(args.rrr, FiatAmount::new(args.amount)?, "");

    let reference = gateway
        .create_invoice_reference(&invoice)
        .await
        .context("failed to create payment reference")?;
    let artifact = gateway
        .build_encoded_artifact(invoice.amount, &reference)
        .context("failed to encode payment request")?;

    if let Some(path) = &args.png {
        fs::write(path, &artifact.png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote QR code");
    }

    if args.show_qr {
        eprintln!("{}", qr::render_terminal_string(&artifact.uri, &config.payment_config().qr)?);
    }

    print_json(&json!({
        "reference": reference.key().to_base58(),
        "memo": reference.memo(),
        "rate": reference.rate_value().to_string(),
        "tokenAmount": artifact.request.amount.to_string(),
        "uri": artifact.uri,
    }))
}

async fn verify_cmd(config: &ToolsConfig, args: VerifyArgs) -> Result<()> {
    // the rate snapshot comes from the command line, not a fresh quote
    let rates: Arc<dyn RateProvider> = Arc::new(FixedRateProvider::new(args.rate)?);
    let gateway = gateway(config, rates)?;

    let key: ReferenceKey = args
        .reference
        .parse()
        .context("invalid reference key")?;
    let invoice = Invoice::new(args.rrr, FiatAmount::new(args.amount)?, "");
    let rate = ExchangeRate::new(RateDirection::OnRamp, args.rate)?;
    let mut reference = PaymentReference::new(key, invoice.payment_memo(), rate)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = gateway
        .verify_with_cancel(&mut reference, invoice.amount, &cancel)
        .await;

    print_json(&serde_json::to_value(&result)?)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
