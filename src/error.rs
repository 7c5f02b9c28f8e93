use std::fmt::Display;

use alloy::{primitives::TxHash, transports};

use crate::correlate::CorrelationError;

/// Failure reported by an external collaborator: chain accessor,
/// metadata or price resolver, or sink.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected empty response")]
    NullResp,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl<E: Display> From<transports::RpcError<E>> for ServiceError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::NullResp => Self::NullResp,
            transports::RpcError::DeserError { .. } => Self::InvalidResponse(value.to_string()),
            _ => Self::Transport(value.to_string()),
        }
    }
}

/// Reason a single trade event could not be turned into a sale.
#[derive(Debug, thiserror::Error)]
pub enum EventErrorKind {
    #[error("transaction receipt unavailable")]
    ReceiptUnavailable,

    #[error("block unavailable")]
    BlockUnavailable,

    #[error("malformed log ordering: {0}")]
    MalformedLogOrdering(#[from] CorrelationError),

    #[error("block timestamp out of range: {0}")]
    InvalidTimestamp(u64),

    #[error("chain lookup failed: {0}")]
    Chain(#[source] ServiceError),

    #[error("metadata lookup failed: {0}")]
    Metadata(#[source] ServiceError),

    #[error("price lookup failed: {0}")]
    Price(#[source] ServiceError),

    #[error("sink rejected sale: {0}")]
    Sink(#[source] ServiceError),
}

/// Per-event extraction failure with the context needed to log and
/// correlate it upstream.
#[derive(Debug, thiserror::Error)]
#[error("provider {provider}, tx {tx_hash}, block {block_number}: {kind}")]
pub struct SaleError {
    pub provider: String,
    pub tx_hash: TxHash,
    pub block_number: u64,
    #[source]
    pub kind: EventErrorKind,
}

impl SaleError {
    pub(crate) fn new(
        provider: &str,
        tx_hash: TxHash,
        block_number: u64,
        kind: impl Into<EventErrorKind>,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            tx_hash,
            block_number,
            kind: kind.into(),
        }
    }

    /// Transport and availability failures may succeed when retried by the
    /// caller, data-integrity failures will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            EventErrorKind::ReceiptUnavailable
                | EventErrorKind::BlockUnavailable
                | EventErrorKind::Chain(_)
                | EventErrorKind::Metadata(_)
                | EventErrorKind::Price(_)
                | EventErrorKind::Sink(_)
        )
    }
}

/// Failure that aborts a whole provider run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("provider {provider}: metadata lookup for {symbol} failed: {source}")]
    Metadata {
        provider: String,
        symbol: String,
        source: ServiceError,
    },
}

/// Chain log could not be decoded into a trade event.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("log emitted by {0}, expected provider contract")]
    UnexpectedEmitter(alloy::primitives::Address),

    #[error("log is missing {0}")]
    MissingField(&'static str),

    #[error("event decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

#[cfg(test)]
mod tests {
    use alloy::primitives::b256;

    use super::*;

    #[test]
    fn test_sale_error_carries_context() {
        let err = SaleError::new(
            "golom",
            b256!("0x00000000000000000000000000000000000000000000000000000000000000aa"),
            14880600,
            EventErrorKind::ReceiptUnavailable,
        );
        let msg = err.to_string();
        assert!(msg.contains("golom"));
        assert!(msg.contains("14880600"));
        assert!(msg.contains("0x00000000000000000000000000000000000000000000000000000000000000aa"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_malformed_ordering_is_not_retryable() {
        let err = SaleError::new(
            "golom",
            TxHash::ZERO,
            1,
            CorrelationError::MarkerWithoutPredecessor,
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_null_rpc_response_maps_to_null_resp() {
        let err: ServiceError = transports::TransportError::NullResp.into();
        assert_eq!(err, ServiceError::NullResp);
    }
}
