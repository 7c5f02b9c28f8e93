use chrono::DateTime;
use tracing::debug;

use super::types::SaleEntity;
use crate::{
    correlate,
    error::{EventErrorKind, SaleError},
    num::Converter,
    provider::ProviderConfig,
    service::{ChainAccessor, PriceResolver},
    types::{RawTradeEvent, SymbolMetadata},
};

/// Turns one order fill into a sale.
///
/// Returns `Ok(None)` when no NFT transfer can be correlated with the fill,
/// such events produce no sale and should be dropped.
///
/// Without `metadata` the raw price is taken as is and no fiat price is
/// computed. Block, price and receipt lookups are not retried.
pub async fn normalize<C, P>(
    event: &RawTradeEvent,
    config: &ProviderConfig,
    metadata: Option<SymbolMetadata>,
    chain: &C,
    prices: &P,
) -> Result<Option<SaleEntity>, SaleError>
where
    C: ChainAccessor,
    P: PriceResolver,
{
    let tx_hash = event.tx_hash();
    let block_number = event.block_number();
    let fail = |kind: EventErrorKind| SaleError::new(config.name(), tx_hash, block_number, kind);

    // Price quote needs the block time, receipt lookup is independent
    let priced_block = async {
        let block = chain
            .block(block_number)
            .await
            .map_err(EventErrorKind::Chain)?
            .ok_or(EventErrorKind::BlockUnavailable)?;
        let quote = prices
            .price_at(config.native_token(), config.protocol(), block.timestamp())
            .await
            .map_err(EventErrorKind::Price)?;
        Ok::<_, EventErrorKind>((block, quote))
    };
    let identity = correlate::identify(config.correlation(), chain, tx_hash);
    let ((block, quote), identity) = futures::try_join!(priced_block, identity).map_err(fail)?;

    let Some(identity) = identity else {
        debug!(provider = config.name(), %tx_hash, "no NFT transfer found for order fill");
        return Ok(None);
    };

    let sold_at = i64::try_from(block.timestamp())
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .ok_or_else(|| fail(EventErrorKind::InvalidTimestamp(block.timestamp())))?;

    let converter = Converter::new(metadata.map_or(0, |m| m.decimals));
    let price = converter.to_amount(event.price());
    let price_usd = metadata.map(|_| price * quote.price);

    Ok(Some(SaleEntity {
        provider_name: config.name().to_string(),
        provider_contract: config.contract(),
        protocol: config.protocol().to_string(),
        nft_contract: identity.contract,
        nft_id: identity.token_id,
        token: config.native_token().to_string(),
        token_symbol: config
            .settlement()
            .symbol_for(event.order_type())
            .to_string(),
        amount: SaleEntity::AMOUNT,
        price,
        price_usd,
        seller: event.maker(),
        buyer: event.taker(),
        sold_at,
        block_number,
        transaction_hash: tx_hash,
    }))
}
