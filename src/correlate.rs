//! NFT identity recovery from the transaction log trail.
//!
//! Order fill events carry price and counterparties but not the traded
//! NFT. The NFT is recovered from the other logs of the same transaction,
//! with a per-provider [`CorrelationStrategy`].

use alloy::primitives::{Address, B256, TxHash, U256, b256};
use itertools::Itertools;
use tracing::debug;

use crate::{
    error::EventErrorKind,
    service::ChainAccessor,
    types::TransactionLog,
};

/// Internal transfer confirmation emitted by the Golom exchange right after
/// the NFT transfer it accounts for.
pub const GOLOM_MARKER: B256 =
    b256!("0x5ff9e72404463058acdc1a7367b634d29a9c3c5aa4d41dddf6321b586afb5aed");

/// `Transfer(address,address,uint256)`
pub const ERC721_TRANSFER: B256 =
    b256!("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Signature plus three indexed parameters.
const INDEXED_TRIPLE_ARITY: usize = 4;

/// Traded NFT.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NftIdentity {
    pub contract: Address,
    pub token_id: U256,
}

impl NftIdentity {
    /// Reads the contract from the log emitter and the token id from the
    /// fourth topic word, big-endian.
    fn from_transfer_log(log: &TransactionLog) -> Option<Self> {
        let token_word = log.topics().get(3)?;
        Some(Self {
            contract: log.address(),
            token_id: U256::from_be_bytes(token_word.0),
        })
    }
}

/// Receipt log sequence contradicts the shape the strategy relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("marker log has no preceding transfer log")]
    MarkerWithoutPredecessor,

    #[error("transfer log {0} has no token id topic")]
    MissingTokenId(usize),
}

/// Locates the NFT transfer log belonging to an order fill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorrelationStrategy {
    /// The NFT transfer is the log immediately preceding the first log whose
    /// signature is `marker` and which carries exactly `arity` topics.
    PrecedingMarker { marker: B256, arity: usize },

    /// The NFT transfer is the first ERC-721 `Transfer` log, distinguished
    /// from ERC-20 transfers by its indexed token id.
    Erc721Transfer,
}

impl CorrelationStrategy {
    pub fn golom() -> Self {
        Self::PrecedingMarker {
            marker: GOLOM_MARKER,
            arity: INDEXED_TRIPLE_ARITY,
        }
    }

    /// Finds the traded NFT in `logs`, given in emission order.
    ///
    /// `Ok(None)` means the receipt contains no log the strategy recognizes.
    /// Only the first match is used when several qualify.
    pub fn correlate(
        &self,
        logs: &[TransactionLog],
    ) -> Result<Option<NftIdentity>, CorrelationError> {
        match self {
            Self::PrecedingMarker { marker, arity } => {
                let Some((pos, _)) = logs.iter().find_position(|log| {
                    log.signature() == Some(*marker) && log.topics().len() == *arity
                }) else {
                    return Ok(None);
                };
                let transfer = pos
                    .checked_sub(1)
                    .and_then(|prev| logs.get(prev))
                    .ok_or(CorrelationError::MarkerWithoutPredecessor)?;
                NftIdentity::from_transfer_log(transfer)
                    .map(Some)
                    .ok_or(CorrelationError::MissingTokenId(transfer.index()))
            }
            Self::Erc721Transfer => Ok(logs
                .iter()
                .find(|log| {
                    log.signature() == Some(ERC721_TRANSFER)
                        && log.topics().len() == INDEXED_TRIPLE_ARITY
                })
                .and_then(NftIdentity::from_transfer_log)),
        }
    }
}

/// Fetches the receipt of `tx_hash` and correlates its logs.
///
/// A missing receipt is an error, a receipt without a recognizable NFT
/// transfer is `Ok(None)`.
pub async fn identify<C: ChainAccessor>(
    strategy: &CorrelationStrategy,
    chain: &C,
    tx_hash: TxHash,
) -> Result<Option<NftIdentity>, EventErrorKind> {
    let receipt = chain
        .transaction_receipt(tx_hash)
        .await
        .map_err(EventErrorKind::Chain)?
        .ok_or(EventErrorKind::ReceiptUnavailable)?;
    let identity = strategy.correlate(receipt.logs())?;
    debug!(%tx_hash, logs = receipt.logs().len(), found = identity.is_some(), "correlated receipt");
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::testing::{LogBuilder, TestChain};

    const NFT: Address = address!("0x00000000000000000000000000000000000000ff");
    const EXCHANGE: Address = address!("0xd29e1fcb07e55eaceb122c63f8e50441c6acedc9");

    fn transfer(index: usize, token_id: u64) -> TransactionLog {
        LogBuilder::new(NFT)
            .topic(ERC721_TRANSFER)
            .topic(B256::left_padding_from(&[0x01]))
            .topic(B256::left_padding_from(&[0x02]))
            .topic(B256::from(U256::from(token_id).to_be_bytes::<32>()))
            .build(index)
    }

    fn marker(index: usize) -> TransactionLog {
        LogBuilder::new(EXCHANGE)
            .topic(GOLOM_MARKER)
            .topic(B256::repeat_byte(0x11))
            .topic(B256::repeat_byte(0x22))
            .topic(B256::repeat_byte(0x33))
            .build(index)
    }

    #[test]
    fn test_marker_preceded_by_transfer() {
        let logs = vec![transfer(0, 7), marker(1)];
        assert_eq!(
            CorrelationStrategy::golom().correlate(&logs),
            Ok(Some(NftIdentity {
                contract: NFT,
                token_id: U256::from(7)
            }))
        );
    }

    #[test]
    fn test_token_id_beyond_u64() {
        let token_id = U256::from(u128::MAX) + U256::from(1);
        let logs = vec![
            LogBuilder::new(NFT)
                .topic(ERC721_TRANSFER)
                .topic(B256::ZERO)
                .topic(B256::ZERO)
                .topic(B256::from(token_id.to_be_bytes::<32>()))
                .build(0),
            marker(1),
        ];
        let identity = CorrelationStrategy::golom().correlate(&logs).unwrap().unwrap();
        assert_eq!(identity.token_id.to_string(), "340282366920938463463374607431768211456");
    }

    #[test]
    fn test_no_marker_is_not_found() {
        let logs = vec![transfer(0, 7), transfer(1, 8)];
        assert_eq!(CorrelationStrategy::golom().correlate(&logs), Ok(None));
        assert_eq!(CorrelationStrategy::golom().correlate(&[]), Ok(None));
    }

    #[test]
    fn test_marker_with_wrong_arity_is_ignored() {
        let short_marker = LogBuilder::new(EXCHANGE)
            .topic(GOLOM_MARKER)
            .topic(B256::repeat_byte(0x11))
            .build(1);
        let logs = vec![transfer(0, 7), short_marker];
        assert_eq!(CorrelationStrategy::golom().correlate(&logs), Ok(None));
    }

    #[test]
    fn test_marker_first_is_malformed() {
        let logs = vec![marker(0), transfer(1, 7)];
        assert_eq!(
            CorrelationStrategy::golom().correlate(&logs),
            Err(CorrelationError::MarkerWithoutPredecessor)
        );
    }

    #[test]
    fn test_predecessor_without_token_topic() {
        let approval = LogBuilder::new(NFT).topic(B256::repeat_byte(0x44)).build(0);
        let logs = vec![approval, marker(1)];
        assert_eq!(
            CorrelationStrategy::golom().correlate(&logs),
            Err(CorrelationError::MissingTokenId(0))
        );
    }

    #[test]
    fn test_first_marker_wins() {
        let logs = vec![transfer(0, 7), marker(1), transfer(2, 9), marker(3)];
        let identity = CorrelationStrategy::golom().correlate(&logs).unwrap().unwrap();
        assert_eq!(identity.token_id, U256::from(7));
    }

    #[test]
    fn test_erc721_strategy_skips_erc20_transfers() {
        let erc20 = LogBuilder::new(address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"))
            .topic(ERC721_TRANSFER)
            .topic(B256::ZERO)
            .topic(B256::ZERO)
            .build(0);
        let logs = vec![erc20, transfer(1, 42)];
        assert_eq!(
            CorrelationStrategy::Erc721Transfer.correlate(&logs),
            Ok(Some(NftIdentity {
                contract: NFT,
                token_id: U256::from(42)
            }))
        );
    }

    #[tokio::test]
    async fn test_identify_missing_receipt() {
        let chain = TestChain::default();
        let result = identify(&CorrelationStrategy::golom(), &chain, TxHash::ZERO).await;
        assert!(matches!(result, Err(EventErrorKind::ReceiptUnavailable)));
    }

    #[tokio::test]
    async fn test_identify_empty_receipt_is_not_found() {
        let chain = TestChain::default();
        chain.add_receipt(TxHash::ZERO, vec![]);
        let result = identify(&CorrelationStrategy::golom(), &chain, TxHash::ZERO).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(chain.receipt_requests(), 1);
    }
}
