//! Error types shared across collector shards
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

use crate::ids::InstrumentId;

/// Reason a feed tick was discarded before reaching the aggregator
///
/// None of these are failures of the collector: feeds routinely carry ticks
/// for instruments another shard owns, or ticks with fields missing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickRejection {
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Tick for instrument {0} has no exchange timestamp")]
    MissingTimestamp(InstrumentId),

    #[error("Tick for instrument {instrument} has out-of-range timestamp {timestamp}")]
    InvalidTimestamp { instrument: InstrumentId, timestamp: i64 },

    #[error("Tick for instrument {0} has no last price")]
    MissingPrice(InstrumentId),

    #[error("Tick for instrument {instrument} has invalid price {price}")]
    InvalidPrice { instrument: InstrumentId, price: f64 },

    #[error("Tick for instrument {0} has no cumulative volume")]
    MissingVolume(InstrumentId),

    #[error("Tick for instrument {instrument} has negative cumulative volume {volume}")]
    InvalidVolume { instrument: InstrumentId, volume: i64 },

    #[error("Stale tick for instrument {instrument}: minute {minute} is older than open minute {open_minute}")]
    StaleTick {
        instrument: InstrumentId,
        minute: i64,
        open_minute: i64,
    },
}

impl TickRejection {
    /// Short label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TickRejection::UnknownInstrument(_) => "unknown_instrument",
            TickRejection::MissingTimestamp(_) => "missing_timestamp",
            TickRejection::InvalidTimestamp { .. } => "invalid_timestamp",
            TickRejection::MissingPrice(_) => "missing_price",
            TickRejection::InvalidPrice { .. } => "invalid_price",
            TickRejection::MissingVolume(_) => "missing_volume",
            TickRejection::InvalidVolume { .. } => "invalid_volume",
            TickRejection::StaleTick { .. } => "stale_tick",
        }
    }
}

/// Invalid identifier input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Stock code must not be blank")]
    BlankStockCode,
}

/// Invalid shard parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("Shard count must be at least 1")]
    ZeroCount,

    #[error("Shard index {index} out of range for {count} shards")]
    IndexOutOfRange { index: usize, count: usize },
}
