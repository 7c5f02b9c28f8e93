//! Sale extraction from marketplace order fills.
//!
//! For every `OrderFilled` event the traded NFT is recovered from the
//! transaction receipt, the raw price is scaled to a decimal native amount
//! and, when the token metadata is known, converted to fiat with the price
//! quote at the block time.
//!
//! # Architecture
//!
//! - [`normalize`] - single event transformation, collaborators passed in
//! - [`SaleExtractor`] - provider run: metadata resolved once, events
//!   processed concurrently, finished sales handed to a [`crate::service::Sink`]
//!
//! # Example
//!
//! ```ignore
//! use nft_sales::{provider::ProviderConfig, sale::SaleExtractor, service::*};
//!
//! let extractor = SaleExtractor::new(
//!     ProviderConfig::golom(),
//!     RpcChainAccessor::new(provider),
//!     metadata_service,
//!     price_service,
//! );
//! let report = extractor.run(events, &LogSink).await?;
//! println!("{} sales, {} skipped, {} failed",
//!     report.sales.len(), report.skipped.len(), report.failed.len());
//! ```

mod extractor;
mod normalize;
mod types;

pub use extractor::{RunReport, SaleExtractor};
pub use normalize::normalize;
pub use types::{SOLD_AT_FORMAT, SaleEntity};
