//! External services the extraction pipeline depends on.
//!
//! The pipeline never reaches for shared global clients: every collaborator
//! is passed in explicitly, so tests can substitute the fakes from
//! [`crate::testing`].

use std::{collections::HashMap, future::Future};

use alloy::{eips::BlockNumberOrTag, primitives::TxHash, providers::Provider};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    error::ServiceError,
    num::Amount,
    sale::SaleEntity,
    types::{BlockInfo, PriceQuote, Receipt, SymbolMetadata},
};

/// Transaction receipts and block metadata.
pub trait ChainAccessor: Send + Sync {
    /// `Ok(None)` when the receipt does not exist (yet), as opposed to a
    /// transport failure.
    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<Receipt>, ServiceError>> + Send;

    fn block(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Option<BlockInfo>, ServiceError>> + Send;
}

/// Token symbol metadata.
pub trait MetadataResolver: Send + Sync {
    /// `Ok(None)` for unlisted tokens.
    fn symbol(
        &self,
        symbol: &str,
        protocol: &str,
    ) -> impl Future<Output = Result<Option<SymbolMetadata>, ServiceError>> + Send;
}

/// Historical token prices.
pub trait PriceResolver: Send + Sync {
    /// Price of one `symbol` unit at `timestamp` (Unix seconds).
    fn price_at(
        &self,
        symbol: &str,
        protocol: &str,
        timestamp: u64,
    ) -> impl Future<Output = Result<PriceQuote, ServiceError>> + Send;
}

/// Destination of finished sales.
pub trait Sink: Send + Sync {
    fn add(&self, sale: SaleEntity) -> impl Future<Output = Result<SaleEntity, ServiceError>> + Send;
}

/// [`ChainAccessor`] backed by an RPC [`Provider`].
///
/// Retries are the provider's concern, e.g. with
/// [`alloy::transports::layers::RetryBackoffLayer`].
#[derive(Clone, Debug)]
pub struct RpcChainAccessor<P> {
    provider: P,
}

impl<P: Provider> RpcChainAccessor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider> ChainAccessor for RpcChainAccessor<P> {
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, ServiceError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.as_ref().map(Receipt::from))
    }

    async fn block(&self, number: u64) -> Result<Option<BlockInfo>, ServiceError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?;
        Ok(block.map(|b| BlockInfo::new(number, b.header.timestamp)))
    }
}

/// Caches resolved metadata, including misses, until [`Self::clear`].
#[derive(Debug)]
pub struct MemoizedMetadata<M> {
    inner: M,
    cache: DashMap<(String, String), Option<SymbolMetadata>>,
}

impl<M: MetadataResolver> MemoizedMetadata<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<M: MetadataResolver> MetadataResolver for MemoizedMetadata<M> {
    async fn symbol(
        &self,
        symbol: &str,
        protocol: &str,
    ) -> Result<Option<SymbolMetadata>, ServiceError> {
        let key = (symbol.to_string(), protocol.to_string());
        let cached = self.cache.get(&key).map(|entry| *entry);
        if let Some(metadata) = cached {
            return Ok(metadata);
        }
        let metadata = self.inner.symbol(symbol, protocol).await?;
        debug!(symbol, protocol, ?metadata, "resolved symbol metadata");
        self.cache.insert(key, metadata);
        Ok(metadata)
    }
}

/// Fixed metadata table keyed by `(symbol, protocol)`.
#[derive(Clone, Debug, Default)]
pub struct StaticMetadata {
    entries: HashMap<(String, String), SymbolMetadata>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, protocol: &str, decimals: u8) -> Self {
        self.entries.insert(
            (symbol.to_string(), protocol.to_string()),
            SymbolMetadata::new(decimals),
        );
        self
    }
}

impl MetadataResolver for StaticMetadata {
    async fn symbol(
        &self,
        symbol: &str,
        protocol: &str,
    ) -> Result<Option<SymbolMetadata>, ServiceError> {
        Ok(self
            .entries
            .get(&(symbol.to_string(), protocol.to_string()))
            .copied())
    }
}

/// Same quote regardless of symbol and time.
#[derive(Clone, Copy, derive_more::Debug)]
pub struct FixedPrice {
    #[debug("{price}")]
    price: Amount,
}

impl FixedPrice {
    pub fn new(price: Amount) -> Self {
        Self { price }
    }
}

impl PriceResolver for FixedPrice {
    async fn price_at(
        &self,
        _symbol: &str,
        _protocol: &str,
        _timestamp: u64,
    ) -> Result<PriceQuote, ServiceError> {
        Ok(PriceQuote::new(self.price))
    }
}

/// Sink that only logs accepted sales.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    async fn add(&self, sale: SaleEntity) -> Result<SaleEntity, ServiceError> {
        info!(
            provider = %sale.provider_name,
            tx_hash = %sale.transaction_hash,
            nft_contract = %format!("{:#x}", sale.nft_contract),
            nft_id = %sale.nft_id,
            price = %sale.price,
            symbol = %sale.token_symbol,
            "sale"
        );
        Ok(sale)
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec256;

    use super::*;
    use crate::testing::TestMetadata;

    #[tokio::test]
    async fn test_memoized_metadata_resolves_once() {
        let inner = TestMetadata::new().with("eth", "ethereum", 18);
        let memo = MemoizedMetadata::new(inner);

        for _ in 0..3 {
            assert_eq!(
                memo.symbol("eth", "ethereum").await,
                Ok(Some(SymbolMetadata::new(18)))
            );
        }
        assert_eq!(memo.inner.calls(), 1);

        memo.clear();
        memo.symbol("eth", "ethereum").await.unwrap();
        assert_eq!(memo.inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_memoized_metadata_caches_misses() {
        let memo = MemoizedMetadata::new(TestMetadata::new());
        assert_eq!(memo.symbol("doge", "ethereum").await, Ok(None));
        assert_eq!(memo.symbol("doge", "ethereum").await, Ok(None));
        assert_eq!(memo.inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_static_metadata_is_keyed_by_protocol() {
        let table = StaticMetadata::new().with("eth", "ethereum", 18);
        assert_eq!(
            table.symbol("eth", "ethereum").await,
            Ok(Some(SymbolMetadata::new(18)))
        );
        assert_eq!(table.symbol("eth", "celo").await, Ok(None));
    }

    #[tokio::test]
    async fn test_fixed_price() {
        let prices = FixedPrice::new(udec256!(2000));
        let quote = prices.price_at("eth", "ethereum", 1654000000).await.unwrap();
        assert_eq!(quote.price, udec256!(2000));
    }
}
