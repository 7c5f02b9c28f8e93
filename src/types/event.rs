use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::{Log, TransactionReceipt},
};
use alloy_sol_types::SolEvent;

use crate::error::DecodeError;

alloy::sol! {
    /// Order fill emitted by the marketplace exchange contract.
    ///
    /// `orderType` selects the settlement currency: `0` for the native coin,
    /// anything else for its wrapped token.
    #[derive(Debug, PartialEq, Eq)]
    event OrderFilled(
        address indexed maker,
        address indexed taker,
        uint256 indexed orderType,
        bytes32 orderHash,
        uint256 price
    );
}

/// Single occurrence of a monitored order fill event.
///
/// Carries the price and counterparties of a trade, but not the identity
/// of the traded NFT, which is recovered from the transaction logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTradeEvent {
    block_number: u64,
    tx_hash: TxHash,
    log_index: u64,
    price: U256,
    maker: Address,
    taker: Address,
    order_type: U256,
}

impl RawTradeEvent {
    pub fn new(
        block_number: u64,
        tx_hash: TxHash,
        log_index: u64,
        price: U256,
        maker: Address,
        taker: Address,
        order_type: U256,
    ) -> Self {
        Self {
            block_number,
            tx_hash,
            log_index,
            price,
            maker,
            taker,
            order_type,
        }
    }

    /// Decodes an [`OrderFilled`] log emitted by `contract`.
    pub fn from_log(contract: Address, log: &Log) -> Result<Self, DecodeError> {
        if log.inner.address != contract {
            return Err(DecodeError::UnexpectedEmitter(log.inner.address));
        }
        let block_number = log
            .block_number
            .ok_or(DecodeError::MissingField("block number"))?;
        let tx_hash = log
            .transaction_hash
            .ok_or(DecodeError::MissingField("transaction hash"))?;
        let fill = OrderFilled::decode_log(&log.inner)?.data;
        Ok(Self::new(
            block_number,
            tx_hash,
            log.log_index.unwrap_or_default(),
            fill.price,
            fill.maker,
            fill.taker,
            fill.orderType,
        ))
    }

    /// Decodes all [`OrderFilled`] logs `contract` emitted in the transaction,
    /// in emission order.
    pub fn from_receipt(
        contract: Address,
        receipt: &TransactionReceipt,
    ) -> Result<Vec<Self>, DecodeError> {
        receipt
            .inner
            .logs()
            .iter()
            .filter(|log| {
                log.inner.address == contract
                    && log.inner.data.topics().first() == Some(&OrderFilled::SIGNATURE_HASH)
            })
            .map(|log| Self::from_log(contract, log))
            .collect()
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn log_index(&self) -> u64 {
        self.log_index
    }

    /// Raw price in the smallest unit of the settlement currency.
    pub fn price(&self) -> U256 {
        self.price
    }

    /// Seller.
    pub fn maker(&self) -> Address {
        self.maker
    }

    /// Buyer.
    pub fn taker(&self) -> Address {
        self.taker
    }

    pub fn order_type(&self) -> U256 {
        self.order_type
    }
}
