//! Sale data structures.

use std::fmt::Display;

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::num::{self, Amount};

/// `soldAt` rendering, UTC with second precision.
pub const SOLD_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Normalized record of one completed NFT trade.
///
/// Serializes with camel-cased keys, lowercase hex addresses, decimal
/// strings for amounts and token id, and [`SOLD_AT_FORMAT`] timestamps.
#[derive(Clone, derive_more::Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEntity {
    /// Provider the sale was extracted by.
    pub provider_name: String,

    /// Marketplace contract emitting the order fill.
    #[serde(serialize_with = "serialize_address")]
    pub provider_contract: Address,

    pub protocol: String,

    /// Contract of the traded NFT.
    #[serde(serialize_with = "serialize_address")]
    pub nft_contract: Address,

    #[debug("{nft_id}")]
    #[serde(serialize_with = "serialize_display")]
    pub nft_id: U256,

    /// Provider native token the fiat price is quoted for.
    pub token: String,

    /// Settlement currency actually used by the trade.
    pub token_symbol: String,

    /// Number of NFTs traded, always [`SaleEntity::AMOUNT`].
    pub amount: u32,

    /// Price in settlement currency units.
    #[debug("{price}")]
    #[serde(serialize_with = "num::serialize_amount")]
    pub price: Amount,

    /// Fiat price, `None` when the token metadata is unknown.
    #[debug("{:?}", price_usd.map(|p| p.to_string()))]
    #[serde(serialize_with = "num::serialize_opt_amount")]
    pub price_usd: Option<Amount>,

    #[serde(serialize_with = "serialize_address")]
    pub seller: Address,

    #[serde(serialize_with = "serialize_address")]
    pub buyer: Address,

    /// Block time.
    #[serde(serialize_with = "serialize_sold_at")]
    pub sold_at: DateTime<Utc>,

    pub block_number: u64,

    #[serde(serialize_with = "serialize_display")]
    pub transaction_hash: TxHash,
}

impl SaleEntity {
    /// Order fills trade exactly one NFT.
    pub const AMOUNT: u32 = 1;

    /// `(token id, NFT contract)` key of the traded NFT.
    pub fn nft_key(&self) -> String {
        format!("{}_{:#x}", self.nft_id, self.nft_contract)
    }
}

fn serialize_address<S: Serializer>(value: &Address, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&format_args!("{value:#x}"))
}

fn serialize_display<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

fn serialize_sold_at<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&value.format(SOLD_AT_FORMAT))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};
    use fastnum::udec256;

    use super::*;

    #[test]
    fn test_nft_key() {
        let sale = SaleEntity {
            provider_name: "golom".to_string(),
            provider_contract: address!("0xd29e1fcb07e55eaceb122c63f8e50441c6acedc9"),
            protocol: "ethereum".to_string(),
            nft_contract: address!("0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D"),
            nft_id: U256::from(4242),
            token: "eth".to_string(),
            token_symbol: "eth".to_string(),
            amount: SaleEntity::AMOUNT,
            price: udec256!(1),
            price_usd: None,
            seller: Address::ZERO,
            buyer: Address::ZERO,
            sold_at: DateTime::from_timestamp(1654000000, 0).unwrap(),
            block_number: 14880600,
            transaction_hash: b256!(
                "0x00000000000000000000000000000000000000000000000000000000000000aa"
            ),
        };
        assert_eq!(
            sale.nft_key(),
            "4242_0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d"
        );
    }
}
