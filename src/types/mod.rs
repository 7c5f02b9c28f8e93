mod event;
mod receipt;

pub use event::{OrderFilled, RawTradeEvent};
pub use receipt::{BlockInfo, Receipt, TransactionLog};

use crate::num::Amount;

/// Decimal precision of a token symbol on a particular protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolMetadata {
    pub decimals: u8,
}

impl SymbolMetadata {
    pub fn new(decimals: u8) -> Self {
        Self { decimals }
    }
}

/// Fiat value of one unit of a token at a point in time.
#[derive(Clone, Copy, derive_more::Debug, PartialEq)]
pub struct PriceQuote {
    #[debug("{price}")]
    pub price: Amount,
}

impl PriceQuote {
    pub fn new(price: Amount) -> Self {
        Self { price }
    }
}
