//! Marketplace provider configuration.
//!
//! A provider is pure data: every provider runs through the same
//! correlation and normalization logic. Chain variants are produced by
//! merging [`ProviderOverrides`] over a base configuration.

use std::ops::RangeInclusive;

use alloy::primitives::{Address, U256, address};
use serde::Deserialize;

use crate::correlate::CorrelationStrategy;

/// Known settlement protocols (chains).
pub mod protocol {
    pub const ETHEREUM: &str = "ethereum";
    pub const CELO: &str = "celo";
}

/// Settlement currency symbols selected by the order type of a fill.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SettlementTokens {
    /// Chain native coin, order type `0`.
    pub native: String,
    /// Wrapped native token, any other order type.
    pub wrapped: String,
}

impl SettlementTokens {
    pub fn new(native: impl Into<String>, wrapped: impl Into<String>) -> Self {
        Self {
            native: native.into(),
            wrapped: wrapped.into(),
        }
    }

    pub fn symbol_for(&self, order_type: U256) -> &str {
        if order_type.is_zero() {
            &self.native
        } else {
            &self.wrapped
        }
    }
}

/// Marketplace contract the sales are extracted from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    name: String,
    contract: Address,
    protocol: String,
    native_token: String,
    settlement: SettlementTokens,
    event_names: Vec<String>,
    start_block: u64,
    scan_range: u64,
    scan_chunk_size: usize,
    correlation: CorrelationStrategy,
}

impl ProviderConfig {
    /// Golom marketplace on Ethereum mainnet.
    pub fn golom() -> Self {
        Self {
            name: "golom".to_string(),
            contract: address!("0xd29e1fcb07e55eaceb122c63f8e50441c6acedc9"),
            protocol: protocol::ETHEREUM.to_string(),
            native_token: "eth".to_string(),
            settlement: SettlementTokens::new("eth", "weth"),
            event_names: vec!["OrderFilled".to_string()],
            start_block: 14880514,
            scan_range: 500,
            scan_chunk_size: 6,
            correlation: CorrelationStrategy::golom(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn custom(
        name: impl Into<String>,
        contract: Address,
        protocol: impl Into<String>,
        native_token: impl Into<String>,
        settlement: SettlementTokens,
        event_names: Vec<String>,
        start_block: u64,
        correlation: CorrelationStrategy,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            name: name.into(),
            contract,
            protocol: protocol.into(),
            native_token: native_token.into(),
            settlement,
            event_names,
            start_block,
            scan_range: 500,
            scan_chunk_size: 6,
            correlation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy of this configuration with every field set in
    /// `overrides` replaced.
    pub fn with_overrides(&self, overrides: ProviderOverrides) -> Result<Self, ConfigError> {
        let mut config = self.clone();
        if let Some(name) = overrides.name {
            config.name = name;
        }
        if let Some(contract) = overrides.contract {
            config.contract = contract
                .parse()
                .map_err(|_| ConfigError::InvalidContract(contract))?;
        }
        if let Some(protocol) = overrides.protocol {
            config.protocol = protocol;
        }
        if let Some(native_token) = overrides.native_token {
            config.native_token = native_token;
        }
        if let Some(settlement) = overrides.settlement {
            config.settlement = settlement;
        }
        if let Some(event_names) = overrides.event_names {
            config.event_names = event_names;
        }
        if let Some(start_block) = overrides.start_block {
            config.start_block = start_block;
        }
        if let Some(scan_range) = overrides.scan_range {
            config.scan_range = scan_range;
        }
        if let Some(scan_chunk_size) = overrides.scan_chunk_size {
            config.scan_chunk_size = scan_chunk_size;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_correlation(mut self, correlation: CorrelationStrategy) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.event_names.is_empty() || self.event_names.iter().any(String::is_empty) {
            return Err(ConfigError::NoEventNames);
        }
        if self.scan_range == 0 {
            return Err(ConfigError::ZeroScanRange);
        }
        if self.scan_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.settlement.native == self.settlement.wrapped {
            return Err(ConfigError::AmbiguousSettlement(self.settlement.native.clone()));
        }
        Ok(())
    }

    /// Splits `[start_block, head]` into consecutive inclusive ranges of at
    /// most `scan_range` blocks.
    pub fn scan_ranges(&self, head: u64) -> impl Iterator<Item = RangeInclusive<u64>> + use<> {
        let range = self.scan_range.max(1);
        (self.start_block..=head)
            .step_by(range as usize)
            .map(move |from| from..=from.saturating_add(range - 1).min(head))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Token the price quote is looked up for.
    pub fn native_token(&self) -> &str {
        &self.native_token
    }

    pub fn settlement(&self) -> &SettlementTokens {
        &self.settlement
    }

    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    pub fn scan_range(&self) -> u64 {
        self.scan_range
    }

    pub fn scan_chunk_size(&self) -> usize {
        self.scan_chunk_size
    }

    pub fn correlation(&self) -> &CorrelationStrategy {
        &self.correlation
    }
}

/// Partial provider configuration, every field optional.
///
/// Loaded from `SALES_`-prefixed environment variables with
/// [`ProviderOverrides::from_env`], e.g. `SALES_PROTOCOL=celo`,
/// `SALES_EVENT_NAMES=OrderFilled`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderOverrides {
    pub name: Option<String>,
    pub contract: Option<String>,
    pub protocol: Option<String>,
    pub native_token: Option<String>,
    #[serde(skip)]
    pub settlement: Option<SettlementTokens>,
    pub event_names: Option<Vec<String>>,
    pub start_block: Option<u64>,
    pub scan_range: Option<u64>,
    pub scan_chunk_size: Option<usize>,
}

impl ProviderOverrides {
    pub const ENV_PREFIX: &str = "SALES_";

    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(Self::ENV_PREFIX).from_env()
    }

    /// Celo deployment: smaller request chunks on the same scan range.
    pub fn celo() -> Self {
        Self {
            protocol: Some(protocol::CELO.to_string()),
            scan_range: Some(500),
            scan_chunk_size: Some(2),
            ..Default::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("provider name is empty")]
    EmptyName,

    #[error("at least one event name is required")]
    NoEventNames,

    #[error("scan range must be positive")]
    ZeroScanRange,

    #[error("scan chunk size must be positive")]
    ZeroChunkSize,

    #[error("invalid contract address: {0}")]
    InvalidContract(String),

    #[error("native and wrapped settlement symbols are both {0}")]
    AmbiguousSettlement(String),
}
