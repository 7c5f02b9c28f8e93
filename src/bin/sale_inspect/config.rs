//! Configuration for the sale inspector.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): RPC endpoint, provider overrides
//! - CLI arguments: transactions to inspect and pricing inputs

use alloy::primitives::TxHash;
use clap::Parser;
use fastnum::decimal::Context;
use nft_sales::{
    num::Amount,
    provider::{ConfigError as ProviderConfigError, ProviderConfig, ProviderOverrides},
};

/// Environment configuration, `SALES_`-prefixed.
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// RPC URL of the provider's chain node
    pub rpc_url: String,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ProviderOverrides::ENV_PREFIX).from_env()
    }
}

/// CLI arguments of the sale inspector.
#[derive(Debug, Parser)]
#[command(name = "sale-inspect")]
#[command(about = "Extract Golom NFT sales from given transactions")]
pub struct CliConfig {
    /// Transaction hashes to inspect (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub tx: Vec<String>,

    /// Fiat price of one native token unit used for every sale
    #[arg(long)]
    pub native_usd: String,

    /// Native token decimals
    #[arg(long, default_value_t = 18)]
    pub decimals: u8,

    /// Treat the native token as unlisted: raw prices, no fiat prices
    #[arg(long)]
    pub unlisted: bool,

    /// Use the Celo deployment of the provider
    #[arg(long)]
    pub celo: bool,
}

/// Validated inspector parameters.
#[derive(Debug)]
pub struct InspectConfig {
    pub tx_hashes: Vec<TxHash>,
    pub native_usd: Amount,
    pub decimals: Option<u8>,
    pub provider: ProviderConfig,
}

impl CliConfig {
    /// Validates the arguments and merges `overrides` over the Golom
    /// provider, after the Celo variant if requested.
    pub fn to_inspect_config(
        &self,
        overrides: ProviderOverrides,
    ) -> Result<InspectConfig, ConfigError> {
        let tx_hashes = self
            .tx
            .iter()
            .map(|tx| tx.parse().map_err(|_| ConfigError::InvalidTxHash(tx.clone())))
            .collect::<Result<Vec<TxHash>, _>>()?;

        let native_usd = Amount::from_str(&self.native_usd, Context::default())
            .map_err(|_| ConfigError::InvalidPrice(self.native_usd.clone()))?;

        let mut provider = ProviderConfig::golom();
        if self.celo {
            provider = provider.with_overrides(ProviderOverrides::celo())?;
        }
        let provider = provider.with_overrides(overrides)?;

        Ok(InspectConfig {
            tx_hashes,
            native_usd,
            decimals: (!self.unlisted).then_some(self.decimals),
            provider,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid transaction hash {0}")]
    InvalidTxHash(String),

    #[error("Invalid native token price {0}")]
    InvalidPrice(String),

    #[error(transparent)]
    Provider(#[from] ProviderConfigError),
}
