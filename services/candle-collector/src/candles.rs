//! One-minute OHLCV candle aggregation
//!
//! Builds OHLCV (Open, High, Low, Close, Volume) candles from validated
//! ticks, one builder per owned instrument.
//!
//! Candle boundaries are aligned to the epoch, so a candle's minute is the
//! tick timestamp floored to a whole minute. Rollover is purely tick-driven:
//! the open candle is finalized the moment a tick for a different minute
//! arrives. Minutes without ticks produce no candles.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tick_types::errors::TickRejection;
use tick_types::ids::InstrumentId;

/// Nanoseconds in one candle interval.
pub const NANOS_PER_MINUTE: i64 = 60 * 1_000_000_000;

/// Start of the one-minute interval a timestamp falls in.
///
/// Serialized as an RFC 3339 UTC string (`2024-02-16T22:30:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MinuteKey(i64);

impl MinuteKey {
    /// Floor a Unix-nanosecond timestamp to its minute.
    ///
    /// Returns `None` when the floored minute does not fit in an `i64`,
    /// which only happens within a minute of `i64::MIN`.
    pub fn from_timestamp(timestamp_nanos: i64) -> Option<Self> {
        timestamp_nanos
            .div_euclid(NANOS_PER_MINUTE)
            .checked_mul(NANOS_PER_MINUTE)
            .map(Self)
    }

    /// Unix nanoseconds at the start of this minute.
    pub fn start_nanos(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }
}

impl fmt::Display for MinuteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.to_datetime().to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

impl Serialize for MinuteKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        parsed
            .timestamp_nanos_opt()
            .and_then(Self::from_timestamp)
            .ok_or_else(|| serde::de::Error::custom("minute out of range"))
    }
}

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub minute: MinuteKey,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    /// Create a new candle from the first tick in its minute.
    pub fn new(minute: MinuteKey, price: f64, volume: u64) -> Self {
        Self {
            minute,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Update the candle with a tick from the same minute.
    pub fn update(&mut self, price: f64, volume: u64) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume = self.volume.saturating_add(volume);
    }

    /// Validate candle integrity (OHLC ordering).
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Outcome of feeding one tick to a builder.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    /// The candle sealed by this tick, if it started a new minute.
    pub finalized: Option<Candle>,
    /// The open candle after this tick; always present.
    pub snapshot: Candle,
}

impl AggregationResult {
    /// Whether this tick closed the previous candle.
    pub fn is_rollover(&self) -> bool {
        self.finalized.is_some()
    }
}

/// What to do with a tick whose minute is older than the open candle's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Treat any different minute as a rollover, older or newer.
    #[default]
    TrustTickOrder,
    /// Discard ticks for minutes before the open candle.
    RejectStale,
}

/// Builds candles for a single instrument.
#[derive(Debug, Default)]
pub struct CandleBuilder {
    /// Currently building candle (not yet finalized).
    current: Option<Candle>,
}

impl CandleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a tick: update the open candle or finalize it and open a new one.
    pub fn ingest(&mut self, minute: MinuteKey, price: f64, volume_delta: u64) -> AggregationResult {
        match &mut self.current {
            Some(candle) if candle.minute == minute => {
                candle.update(price, volume_delta);
                AggregationResult {
                    finalized: None,
                    snapshot: candle.clone(),
                }
            }
            _ => {
                let opened = Candle::new(minute, price, volume_delta);
                let finalized = self.current.replace(opened.clone());
                AggregationResult {
                    finalized,
                    snapshot: opened,
                }
            }
        }
    }

    /// Get the current (unfinalized) candle.
    pub fn current_candle(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Minute of the open candle, if any.
    pub fn current_minute(&self) -> Option<MinuteKey> {
        self.current.as_ref().map(|c| c.minute)
    }
}

/// Owns one candle builder per instrument of a shard.
///
/// Builders are created up front for every owned instrument and live as
/// long as the aggregator.
pub struct CandleAggregator {
    builders: BTreeMap<InstrumentId, CandleBuilder>,
    policy: StalePolicy,
}

impl CandleAggregator {
    pub fn new(instruments: impl IntoIterator<Item = InstrumentId>, policy: StalePolicy) -> Self {
        let builders = instruments
            .into_iter()
            .map(|id| (id, CandleBuilder::new()))
            .collect();
        Self { builders, policy }
    }

    /// Check whether a tick would be accepted, without mutating anything.
    pub fn check(&self, instrument: InstrumentId, minute: MinuteKey) -> Result<(), TickRejection> {
        let builder = self
            .builders
            .get(&instrument)
            .ok_or(TickRejection::UnknownInstrument(instrument))?;

        if self.policy == StalePolicy::RejectStale {
            if let Some(open_minute) = builder.current_minute() {
                if minute < open_minute {
                    return Err(TickRejection::StaleTick {
                        instrument,
                        minute: minute.start_nanos(),
                        open_minute: open_minute.start_nanos(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Feed a tick to the instrument's builder.
    pub fn ingest(
        &mut self,
        instrument: InstrumentId,
        minute: MinuteKey,
        price: f64,
        volume_delta: u64,
    ) -> Result<AggregationResult, TickRejection> {
        self.check(instrument, minute)?;
        let builder = self
            .builders
            .get_mut(&instrument)
            .ok_or(TickRejection::UnknownInstrument(instrument))?;
        Ok(builder.ingest(minute, price, volume_delta))
    }

    /// Get the open candle for an instrument.
    pub fn current_candle(&self, instrument: InstrumentId) -> Option<&Candle> {
        self.builders.get(&instrument)?.current_candle()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}


// ── Property-Based Tests ────────────────────────────────────────────

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn at(timestamp: i64) -> MinuteKey {
        MinuteKey::from_timestamp(timestamp).unwrap()
    }

    proptest! {
        #[test]
        fn prop_same_minute_ohlc(
            prices in proptest::collection::vec(0.01f64..100_000.0, 1..50),
            base_minute in 0i64..10_000_000,
        ) {
            let mut builder = CandleBuilder::new();
            let start = base_minute * NANOS_PER_MINUTE;
            let step = NANOS_PER_MINUTE / 64;

            let mut last = None;
            for (i, &price) in prices.iter().enumerate() {
                let result = builder.ingest(at(start + i as i64 * step), price, 1);
                prop_assert!(!result.is_rollover() || i == 0);
                last = Some(result.snapshot);
            }

            let candle = last.unwrap();
            let max = prices.iter().cloned().fold(f64::MIN, f64::max);
            let min = prices.iter().cloned().fold(f64::MAX, f64::min);

            prop_assert_eq!(candle.open, prices[0]);
            prop_assert_eq!(candle.close, *prices.last().unwrap());
            prop_assert_eq!(candle.high, max);
            prop_assert_eq!(candle.low, min);
            prop_assert_eq!(candle.volume, prices.len() as u64);
            prop_assert!(candle.is_valid());
        }

        #[test]
        fn prop_single_finalize_per_boundary(
            first in proptest::collection::vec(1.0f64..1_000.0, 1..20),
            second in proptest::collection::vec(1.0f64..1_000.0, 1..20),
        ) {
            let mut builder = CandleBuilder::new();
            let step = NANOS_PER_MINUTE / 32;
            let mut finalized = Vec::new();

            for (i, &price) in first.iter().enumerate() {
                finalized.extend(builder.ingest(at(i as i64 * step), price, 1).finalized);
            }
            let before_rollover = builder.current_candle().cloned().unwrap();

            for (i, &price) in second.iter().enumerate() {
                finalized.extend(
                    builder.ingest(at(NANOS_PER_MINUTE + i as i64 * step), price, 1).finalized,
                );
            }

            prop_assert_eq!(finalized.len(), 1);
            prop_assert_eq!(&finalized[0], &before_rollover);
            prop_assert_eq!(finalized[0].minute, at(0));
        }
    }
}
