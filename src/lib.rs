//! NFT marketplace sales extraction.
//!
//! # Overview
//!
//! Turns marketplace order fill events into normalized sale records.
//!
//! Order fills carry price and counterparties but not the traded NFT.
//! [`correlate`] recovers it from the transaction receipt, then
//! [`sale::normalize`] scales the price by token decimals, prices it in fiat
//! at the block time and assembles a [`sale::SaleEntity`].
//!
//! Use [`types::RawTradeEvent`] to decode logs of a provider contract,
//! [`provider::ProviderConfig`] to describe the provider, and
//! [`sale::SaleExtractor`] to run a batch of events into a
//! [`service::Sink`].
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Block scanning and scheduling are left to the caller,
//!   [`provider::ProviderConfig::scan_ranges`] only plans the ranges.
//!
//! * Failed events are reported, not retried.
//!
//! # Testing
//!
//! [`testing`] module provides in-memory chain, metadata, price and sink
//! implementations along with receipt log builders.

pub mod correlate;
pub mod error;
pub mod num;
pub mod provider;
pub mod sale;
pub mod service;
pub mod testing;
pub mod types;
