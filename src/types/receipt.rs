use alloy::{
    primitives::{Address, B256, TxHash},
    rpc::types::TransactionReceipt,
};

/// Log entry of a transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionLog {
    index: usize,
    address: Address,
    topics: Vec<B256>,
}

impl TransactionLog {
    pub fn new(index: usize, address: Address, topics: Vec<B256>) -> Self {
        Self {
            index,
            address,
            topics,
        }
    }

    /// Position within the receipt log list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Emitting contract.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn topics(&self) -> &[B256] {
        &self.topics
    }

    /// Event signature, `topics[0]`.
    pub fn signature(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// Transaction receipt with logs in on-chain emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    tx_hash: TxHash,
    logs: Vec<TransactionLog>,
}

impl Receipt {
    pub fn new(tx_hash: TxHash, logs: Vec<TransactionLog>) -> Self {
        Self { tx_hash, logs }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn logs(&self) -> &[TransactionLog] {
        &self.logs
    }
}

impl From<&TransactionReceipt> for Receipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        let logs = receipt
            .inner
            .logs()
            .iter()
            .enumerate()
            .map(|(index, log)| {
                TransactionLog::new(index, log.inner.address, log.inner.data.topics().to_vec())
            })
            .collect();
        Self::new(receipt.transaction_hash, logs)
    }
}

/// Block metadata needed to date a trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    number: u64,
    timestamp: u64,
}

impl BlockInfo {
    pub fn new(number: u64, timestamp: u64) -> Self {
        Self { number, timestamp }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Unix timestamp, seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}
