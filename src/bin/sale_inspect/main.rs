//! Golom sale inspector.
//!
//! Fetches the receipts of the given transactions, decodes the order fills
//! and prints the extracted sales as JSON lines.

mod config;

use std::process::exit;

use alloy::{
    providers::{Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::layers::RetryBackoffLayer,
};
use clap::Parser;
use nft_sales::{
    provider::ProviderOverrides,
    sale::SaleExtractor,
    service::{FixedPrice, LogSink, RpcChainAccessor, StaticMetadata},
    types::RawTradeEvent,
};
use tracing::{error, info, warn};

use config::{CliConfig, EnvConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };
    let overrides = match ProviderOverrides::from_env() {
        Ok(overrides) => overrides,
        Err(e) => {
            eprintln!("Failed to parse provider overrides: {}", e);
            exit(1);
        }
    };

    let inspect = match CliConfig::parse().to_inspect_config(overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let client = RpcClient::builder()
        .layer(RetryBackoffLayer::new(10, 100, 200))
        .connect(&env_config.rpc_url)
        .await?;
    let provider = ProviderBuilder::new().connect_client(client);

    let config = inspect.provider;
    let mut metadata = StaticMetadata::new();
    if let Some(decimals) = inspect.decimals {
        metadata = metadata.with(config.native_token(), config.protocol(), decimals);
    }
    let extractor = SaleExtractor::new(
        config,
        RpcChainAccessor::new(provider),
        metadata,
        FixedPrice::new(inspect.native_usd),
    );

    let mut events = Vec::new();
    for tx_hash in inspect.tx_hashes {
        let Some(receipt) = extractor
            .chain()
            .provider()
            .get_transaction_receipt(tx_hash)
            .await?
        else {
            warn!(%tx_hash, "transaction receipt not found");
            continue;
        };
        let fills = RawTradeEvent::from_receipt(extractor.config().contract(), &receipt)?;
        info!(%tx_hash, fills = fills.len(), "decoded order fills");
        events.extend(fills);
    }

    let report = extractor.run(events, &LogSink).await?;
    for sale in &report.sales {
        println!("{}", serde_json::to_string(sale)?);
    }
    for err in &report.failed {
        error!(%err, "sale extraction failed");
    }

    if !report.failed.is_empty() {
        exit(2);
    }
    Ok(())
}
