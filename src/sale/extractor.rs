use alloy::primitives::TxHash;
use futures::{StreamExt, stream};
use tracing::{info, warn};

use super::{normalize::normalize, types::SaleEntity};
use crate::{
    error::{EventErrorKind, RunError, SaleError},
    provider::ProviderConfig,
    service::{ChainAccessor, MemoizedMetadata, MetadataResolver, PriceResolver, Sink},
    types::RawTradeEvent,
};

/// Outcome of one [`SaleExtractor::run`].
#[derive(Debug, Default)]
pub struct RunReport {
    /// Sales accepted by the sink, in event order.
    pub sales: Vec<SaleEntity>,

    /// Transactions whose order fill had no correlatable NFT transfer.
    pub skipped: Vec<TxHash>,

    /// Events that failed, the rest of the run is unaffected.
    pub failed: Vec<SaleError>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.sales.len() + self.skipped.len() + self.failed.len()
    }
}

/// Runs trade events of one provider through correlation and
/// normalization, handing the resulting sales to a [`Sink`].
#[derive(Debug)]
pub struct SaleExtractor<C, M, P> {
    config: ProviderConfig,
    chain: C,
    metadata: MemoizedMetadata<M>,
    prices: P,
}

impl<C, M, P> SaleExtractor<C, M, P>
where
    C: ChainAccessor,
    M: MetadataResolver,
    P: PriceResolver,
{
    pub fn new(config: ProviderConfig, chain: C, metadata: M, prices: P) -> Self {
        Self {
            config,
            chain,
            metadata: MemoizedMetadata::new(metadata),
            prices,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Normalizes a single event, `Ok(None)` if it produces no sale.
    pub async fn process(&self, event: &RawTradeEvent) -> Result<Option<SaleEntity>, SaleError> {
        let metadata = self
            .metadata
            .symbol(self.config.native_token(), self.config.protocol())
            .await
            .map_err(|e| {
                SaleError::new(
                    self.config.name(),
                    event.tx_hash(),
                    event.block_number(),
                    EventErrorKind::Metadata(e),
                )
            })?;
        normalize(event, &self.config, metadata, &self.chain, &self.prices).await
    }

    /// Processes `events` with up to `scan_chunk_size` in flight and
    /// forwards every sale to `sink`.
    ///
    /// Token metadata is resolved once per run. Failing events are
    /// collected in the report and never abort the run, only a metadata
    /// lookup failure does.
    pub async fn run<S: Sink>(
        &self,
        events: impl IntoIterator<Item = RawTradeEvent>,
        sink: &S,
    ) -> Result<RunReport, RunError> {
        let provider = self.config.name();
        self.metadata.clear();
        let metadata = self
            .metadata
            .symbol(self.config.native_token(), self.config.protocol())
            .await
            .map_err(|source| RunError::Metadata {
                provider: provider.to_string(),
                symbol: self.config.native_token().to_string(),
                source,
            })?;
        if metadata.is_none() {
            warn!(
                provider,
                symbol = self.config.native_token(),
                protocol = self.config.protocol(),
                "no token metadata, fiat prices will be omitted"
            );
        }

        let events: Vec<_> = events.into_iter().collect();
        let concurrency = self.config.scan_chunk_size().max(1);
        let mut outcomes = stream::iter(&events)
            .map(|event| async move {
                let outcome =
                    normalize(event, &self.config, metadata, &self.chain, &self.prices).await;
                (event, outcome)
            })
            .buffered(concurrency);

        let mut report = RunReport::default();
        while let Some((event, outcome)) = outcomes.next().await {
            match outcome {
                Ok(Some(sale)) => match sink.add(sale).await {
                    Ok(sale) => report.sales.push(sale),
                    Err(e) => {
                        let err = SaleError::new(
                            provider,
                            event.tx_hash(),
                            event.block_number(),
                            EventErrorKind::Sink(e),
                        );
                        warn!(%err, "failed to store sale");
                        report.failed.push(err);
                    }
                },
                Ok(None) => {
                    warn!(provider, tx_hash = %event.tx_hash(), "order fill without NFT transfer, skipping");
                    report.skipped.push(event.tx_hash());
                }
                Err(err) => {
                    warn!(%err, retryable = err.is_retryable(), "failed to extract sale");
                    report.failed.push(err);
                }
            }
        }

        info!(
            provider,
            events = events.len(),
            sales = report.sales.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "extraction run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256, address, b256};
    use fastnum::udec256;

    use super::*;
    use crate::{
        error::ServiceError,
        testing::{MemorySink, TestChain, TestMetadata, TestPrices, marker_log, transfer_log},
    };

    const NFT: Address = address!("0x00000000000000000000000000000000000000ff");

    fn event(block_number: u64, tx_hash: TxHash) -> RawTradeEvent {
        RawTradeEvent::new(
            block_number,
            tx_hash,
            0,
            U256::from(1_000_000_000_000_000_000u128),
            address!("0x0000000000000000000000000000000000000001"),
            address!("0x0000000000000000000000000000000000000002"),
            U256::ZERO,
        )
    }

    fn tx(byte: u8) -> TxHash {
        TxHash::repeat_byte(byte)
    }

    fn extractor(
        chain: TestChain,
        metadata: TestMetadata,
    ) -> SaleExtractor<TestChain, TestMetadata, TestPrices> {
        SaleExtractor::new(
            ProviderConfig::golom(),
            chain,
            metadata,
            TestPrices::fixed(udec256!(2000)),
        )
    }

    #[tokio::test]
    async fn test_run_isolates_failures() {
        let chain = TestChain::default();
        for (block, byte) in [(10, 1), (11, 2), (12, 3)] {
            chain.add_block(block, 1654000000 + block);
            if byte != 2 {
                chain.add_receipt(tx(byte), vec![transfer_log(0, NFT, byte.into()), marker_log(1)]);
            }
        }
        let extractor = extractor(chain, TestMetadata::new().with("eth", "ethereum", 18));
        let sink = MemorySink::default();

        let report = extractor
            .run(
                vec![event(10, tx(1)), event(11, tx(2)), event(12, tx(3))],
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(report.processed(), 3);
        assert_eq!(report.sales.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].tx_hash, tx(2));
        assert!(matches!(report.failed[0].kind, EventErrorKind::ReceiptUnavailable));
        assert_eq!(sink.sales(), report.sales);
        assert_eq!(report.sales[0].transaction_hash, tx(1));
        assert_eq!(report.sales[1].transaction_hash, tx(3));
    }

    #[tokio::test]
    async fn test_run_skips_fills_without_transfer() {
        let chain = TestChain::default();
        chain.add_block(10, 1654000000);
        chain.add_receipt(tx(1), vec![transfer_log(0, NFT, 1)]);
        let extractor = extractor(chain, TestMetadata::new().with("eth", "ethereum", 18));
        let sink = MemorySink::default();

        let report = extractor.run(vec![event(10, tx(1))], &sink).await.unwrap();
        assert!(report.sales.is_empty());
        assert_eq!(report.skipped, vec![tx(1)]);
        assert!(sink.sales().is_empty());
    }

    #[tokio::test]
    async fn test_run_resolves_metadata_once() {
        let chain = TestChain::default();
        for byte in 1..=4u8 {
            chain.add_block(byte.into(), 1654000000);
            chain.add_receipt(tx(byte), vec![transfer_log(0, NFT, byte.into()), marker_log(1)]);
        }
        let extractor = extractor(chain, TestMetadata::new().with("eth", "ethereum", 18));
        let sink = MemorySink::default();
        let events: Vec<_> = (1..=4u8).map(|b| event(b.into(), tx(b))).collect();

        let report = extractor.run(events.clone(), &sink).await.unwrap();
        assert_eq!(report.sales.len(), 4);
        assert_eq!(extractor.metadata.inner().calls(), 1);

        extractor.run(events, &sink).await.unwrap();
        assert_eq!(extractor.metadata.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_run_without_metadata_omits_fiat_price() {
        let chain = TestChain::default();
        chain.add_block(10, 1654000000);
        chain.add_receipt(tx(1), vec![transfer_log(0, NFT, 1), marker_log(1)]);
        let extractor = extractor(chain, TestMetadata::new());

        let report = extractor
            .run(vec![event(10, tx(1))], &MemorySink::default())
            .await
            .unwrap();
        assert_eq!(report.sales[0].price_usd, None);
        assert_eq!(report.sales[0].price, udec256!(1000000000000000000));
    }

    #[tokio::test]
    async fn test_run_aborts_on_metadata_failure() {
        let extractor = extractor(
            TestChain::default(),
            TestMetadata::failing(ServiceError::Unavailable("metadata".to_string())),
        );
        let err = extractor
            .run(vec![event(10, tx(1))], &MemorySink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Metadata { ref symbol, .. } if symbol == "eth"));
    }

    #[tokio::test]
    async fn test_run_records_sink_failures() {
        let chain = TestChain::default();
        chain.add_block(10, 1654000000);
        chain.add_receipt(tx(1), vec![transfer_log(0, NFT, 1), marker_log(1)]);
        let extractor = extractor(chain, TestMetadata::new().with("eth", "ethereum", 18));
        let sink = MemorySink::failing(ServiceError::Transport("db down".to_string()));

        let report = extractor.run(vec![event(10, tx(1))], &sink).await.unwrap();
        assert!(report.sales.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].kind, EventErrorKind::Sink(_)));
        assert!(report.failed[0].is_retryable());
    }

    #[tokio::test]
    async fn test_process_single_event() {
        let chain = TestChain::default();
        chain.add_block(10, 1654000000);
        chain.add_receipt(
            b256!("0x00000000000000000000000000000000000000000000000000000000000000aa"),
            vec![transfer_log(0, NFT, 5), marker_log(1)],
        );
        let extractor = extractor(chain, TestMetadata::new().with("eth", "ethereum", 18));

        let sale = extractor
            .process(&event(
                10,
                b256!("0x00000000000000000000000000000000000000000000000000000000000000aa"),
            ))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sale.nft_id, U256::from(5));
        assert_eq!(sale.price_usd, Some(udec256!(2000)));
    }
}
