//! In-memory collaborators and log builders for tests.
//!
//! [`TestChain`], [`TestMetadata`], [`TestPrices`] and [`MemorySink`] stand in
//! for the services in [`crate::service`], recording the requests they serve
//! and optionally failing every call.
//!
//! [`LogBuilder`] and the [`transfer_log`]/[`marker_log`] shortcuts build
//! receipt log trails the way the Golom exchange emits them.
//! [`rpc_log`], [`order_filled_log`] and [`transaction_receipt`] build the
//! raw RPC shapes.
//!

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use alloy::{
    primitives::{Address, B256, Bloom, LogData, TxHash, U256, address},
    rpc::types::{Log, TransactionReceipt},
};
use alloy_sol_types::SolEvent;
use dashmap::DashMap;

use crate::{
    correlate::{ERC721_TRANSFER, GOLOM_MARKER},
    error::ServiceError,
    num::Amount,
    sale::SaleEntity,
    service::{ChainAccessor, MetadataResolver, PriceResolver, Sink},
    types::{BlockInfo, OrderFilled, PriceQuote, Receipt, SymbolMetadata, TransactionLog},
};

/// Golom exchange contract on Ethereum mainnet.
pub const GOLOM_EXCHANGE: Address = address!("0xd29e1fcb07e55eaceb122c63f8e50441c6acedc9");

#[derive(Debug, Default)]
pub struct TestChain {
    receipts: DashMap<TxHash, Receipt>,
    blocks: DashMap<u64, BlockInfo>,
    failure: Option<ServiceError>,
    receipt_requests: AtomicUsize,
}

impl TestChain {
    /// Chain where every lookup fails with `err`.
    pub fn failing(err: ServiceError) -> Self {
        Self {
            failure: Some(err),
            ..Default::default()
        }
    }

    pub fn add_receipt(&self, tx_hash: TxHash, logs: Vec<TransactionLog>) {
        self.receipts.insert(tx_hash, Receipt::new(tx_hash, logs));
    }

    /// Registers an RPC receipt the way [`crate::service::RpcChainAccessor`]
    /// would return it.
    pub fn add_transaction_receipt(&self, receipt: &TransactionReceipt) {
        let receipt = Receipt::from(receipt);
        self.receipts.insert(receipt.tx_hash(), receipt);
    }

    pub fn add_block(&self, number: u64, timestamp: u64) {
        self.blocks.insert(number, BlockInfo::new(number, timestamp));
    }

    pub fn receipt_requests(&self) -> usize {
        self.receipt_requests.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), ServiceError> {
        self.failure.clone().map_or(Ok(()), Err)
    }
}

impl ChainAccessor for TestChain {
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, ServiceError> {
        self.receipt_requests.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self.receipts.get(&tx_hash).map(|r| r.clone()))
    }

    async fn block(&self, number: u64) -> Result<Option<BlockInfo>, ServiceError> {
        self.check()?;
        Ok(self.blocks.get(&number).map(|b| *b))
    }
}

#[derive(Debug, Default)]
pub struct TestMetadata {
    entries: DashMap<(String, String), SymbolMetadata>,
    failure: Option<ServiceError>,
    calls: AtomicUsize,
}

impl TestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: ServiceError) -> Self {
        Self {
            failure: Some(err),
            ..Default::default()
        }
    }

    pub fn with(self, symbol: &str, protocol: &str, decimals: u8) -> Self {
        self.entries.insert(
            (symbol.to_string(), protocol.to_string()),
            SymbolMetadata::new(decimals),
        );
        self
    }

    /// Number of lookups served, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl MetadataResolver for TestMetadata {
    async fn symbol(
        &self,
        symbol: &str,
        protocol: &str,
    ) -> Result<Option<SymbolMetadata>, ServiceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .entries
            .get(&(symbol.to_string(), protocol.to_string()))
            .map(|m| *m))
    }
}

#[derive(Debug)]
pub struct TestPrices {
    quote: Result<Amount, ServiceError>,
    requests: Mutex<Vec<(String, String, u64)>>,
}

impl TestPrices {
    pub fn fixed(price: Amount) -> Self {
        Self {
            quote: Ok(price),
            requests: Mutex::default(),
        }
    }

    pub fn failing(err: ServiceError) -> Self {
        Self {
            quote: Err(err),
            requests: Mutex::default(),
        }
    }

    /// `(symbol, protocol, timestamp)` of every request, in arrival order.
    pub fn requests(&self) -> Vec<(String, String, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PriceResolver for TestPrices {
    async fn price_at(
        &self,
        symbol: &str,
        protocol: &str,
        timestamp: u64,
    ) -> Result<PriceQuote, ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), protocol.to_string(), timestamp));
        self.quote.clone().map(PriceQuote::new)
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    sales: Mutex<Vec<SaleEntity>>,
    failure: Option<ServiceError>,
}

impl MemorySink {
    pub fn failing(err: ServiceError) -> Self {
        Self {
            sales: Mutex::default(),
            failure: Some(err),
        }
    }

    /// Stored sales, in insertion order.
    pub fn sales(&self) -> Vec<SaleEntity> {
        self.sales.lock().unwrap().clone()
    }
}

impl Sink for MemorySink {
    async fn add(&self, sale: SaleEntity) -> Result<SaleEntity, ServiceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.sales.lock().unwrap().push(sale.clone());
        Ok(sale)
    }
}

/// Builder of receipt log entries.
///
/// ```
/// use alloy::primitives::{Address, B256};
/// use nft_sales::testing::LogBuilder;
///
/// let log = LogBuilder::new(Address::ZERO)
///     .topic(B256::repeat_byte(0x01))
///     .build(0);
/// assert_eq!(log.topics().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct LogBuilder {
    address: Address,
    topics: Vec<B256>,
}

impl LogBuilder {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            topics: Vec::new(),
        }
    }

    pub fn topic(mut self, topic: B256) -> Self {
        self.topics.push(topic);
        self
    }

    pub fn build(self, index: usize) -> TransactionLog {
        TransactionLog::new(index, self.address, self.topics)
    }
}

/// ERC-721 `Transfer` of `token_id` emitted by `nft`.
pub fn transfer_log(index: usize, nft: Address, token_id: u64) -> TransactionLog {
    LogBuilder::new(nft)
        .topic(ERC721_TRANSFER)
        .topic(B256::left_padding_from(&[0x0a]))
        .topic(B256::left_padding_from(&[0x0b]))
        .topic(B256::from(U256::from(token_id).to_be_bytes::<32>()))
        .build(index)
}

/// Golom internal transfer marker with its three indexed parameters.
pub fn marker_log(index: usize) -> TransactionLog {
    LogBuilder::new(GOLOM_EXCHANGE)
        .topic(GOLOM_MARKER)
        .topic(B256::repeat_byte(0x11))
        .topic(B256::repeat_byte(0x22))
        .topic(B256::repeat_byte(0x33))
        .build(index)
}

/// RPC log as returned by `eth_getLogs`.
pub fn rpc_log(
    emitter: Address,
    block_number: u64,
    tx_hash: TxHash,
    log_index: u64,
    data: LogData,
) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: emitter,
            data,
        },
        block_number: Some(block_number),
        transaction_hash: Some(tx_hash),
        log_index: Some(log_index),
        ..Default::default()
    }
}

/// `OrderFilled` RPC log as returned by `eth_getLogs`.
pub fn order_filled_log(
    emitter: Address,
    block_number: u64,
    tx_hash: TxHash,
    fill: OrderFilled,
) -> Log {
    rpc_log(emitter, block_number, tx_hash, 0, fill.encode_log_data())
}

/// RPC log carrying only `topics`, e.g. an NFT transfer or a marker.
pub fn topics_log(
    emitter: Address,
    block_number: u64,
    tx_hash: TxHash,
    log_index: u64,
    topics: Vec<B256>,
) -> Log {
    rpc_log(
        emitter,
        block_number,
        tx_hash,
        log_index,
        LogData::new_unchecked(topics, Default::default()),
    )
}

/// Successful EIP-1559 transaction receipt with `logs` in emission order,
/// in the shape `eth_getTransactionReceipt` returns it.
pub fn transaction_receipt(tx_hash: TxHash, block_number: u64, logs: &[Log]) -> TransactionReceipt {
    serde_json::from_value(serde_json::json!({
        "type": "0x2",
        "status": "0x1",
        "cumulativeGasUsed": "0x5208",
        "logs": logs,
        "logsBloom": Bloom::ZERO,
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0xbb),
        "blockNumber": format!("{block_number:#x}"),
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "from": Address::repeat_byte(0x0f),
        "to": GOLOM_EXCHANGE,
        "contractAddress": null,
    }))
    .unwrap()
}
