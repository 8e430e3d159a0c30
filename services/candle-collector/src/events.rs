//! Feed event definitions for the collector
//!
//! `RawTick` mirrors what the market-data feed hands the callback: every
//! field except the instrument token may be absent. `Tick` is the validated
//! form the aggregation path works with. `FeedEvent` covers the connection
//! lifecycle the collector observes but never acts on beyond logging.

use serde::{Deserialize, Serialize};
use tick_types::errors::TickRejection;
use tick_types::ids::InstrumentId;

use crate::candles::MinuteKey;

/// A tick as delivered by the feed, before validation.
///
/// Field aliases accept the feed's native names (`instrument_token`,
/// `volume_traded`) as well as the collector's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    #[serde(alias = "instrument_token")]
    pub instrument_id: InstrumentId,
    /// Unix nanoseconds from the exchange clock
    #[serde(default)]
    pub exchange_timestamp: Option<i64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    /// Running traded volume for the session
    #[serde(default, alias = "volume_traded")]
    pub cumulative_volume: Option<i64>,
}

impl RawTick {
    /// Build a fully populated raw tick.
    pub fn new(
        instrument_id: InstrumentId,
        exchange_timestamp: i64,
        last_price: f64,
        cumulative_volume: i64,
    ) -> Self {
        Self {
            instrument_id,
            exchange_timestamp: Some(exchange_timestamp),
            last_price: Some(last_price),
            cumulative_volume: Some(cumulative_volume),
        }
    }

    /// Validate the tick's fields.
    ///
    /// Does not check whether the instrument is owned by this shard; that
    /// lookup belongs to the collector.
    pub fn normalize(&self) -> Result<Tick, TickRejection> {
        let instrument = self.instrument_id;

        let timestamp = self
            .exchange_timestamp
            .ok_or(TickRejection::MissingTimestamp(instrument))?;
        let minute = MinuteKey::from_timestamp(timestamp)
            .ok_or(TickRejection::InvalidTimestamp { instrument, timestamp })?;

        let price = self
            .last_price
            .ok_or(TickRejection::MissingPrice(instrument))?;
        if !price.is_finite() || price < 0.0 {
            return Err(TickRejection::InvalidPrice { instrument, price });
        }

        let volume = self
            .cumulative_volume
            .ok_or(TickRejection::MissingVolume(instrument))?;
        let cumulative_volume = u64::try_from(volume)
            .map_err(|_| TickRejection::InvalidVolume { instrument, volume })?;

        Ok(Tick {
            instrument_id: instrument,
            timestamp,
            minute,
            price,
            cumulative_volume,
        })
    }
}

/// A validated tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub instrument_id: InstrumentId,
    /// Unix nanoseconds from the exchange clock
    pub timestamp: i64,
    /// Candle the tick belongs to
    pub minute: MinuteKey,
    pub price: f64,
    pub cumulative_volume: u64,
}

/// Events produced by a feed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Connection established; the collector answers with its subscription.
    Connected,
    /// A batch of ticks, to be processed in order.
    Ticks { ticks: Vec<RawTick> },
    /// Connection closed by either side.
    Disconnected {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        reason: String,
    },
    /// Transport or protocol error reported by the feed client.
    Error {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        reason: String,
    },
}

impl FeedEvent {
    /// Get the event type as a string label for logging.
    pub fn event_type_label(&self) -> &'static str {
        match self {
            FeedEvent::Connected => "Connected",
            FeedEvent::Ticks { .. } => "Ticks",
            FeedEvent::Disconnected { .. } => "Disconnected",
            FeedEvent::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: i64 = 1_708_123_456_000_000_000;

    #[test]
    fn test_normalize_valid_tick() {
        let raw = RawTick::new(InstrumentId::new(408065), TS, 1520.5, 1_000);
        let tick = raw.normalize().unwrap();
        assert_eq!(tick.instrument_id, InstrumentId::new(408065));
        assert_eq!(tick.timestamp, TS);
        assert_eq!(tick.minute.to_string(), "2024-02-16T22:44:00Z");
        assert_eq!(tick.price, 1520.5);
        assert_eq!(tick.cumulative_volume, 1_000);
    }

    #[test]
    fn test_normalize_missing_timestamp() {
        let mut raw = RawTick::new(InstrumentId::new(1), TS, 10.0, 5);
        raw.exchange_timestamp = None;
        assert_eq!(
            raw.normalize(),
            Err(TickRejection::MissingTimestamp(InstrumentId::new(1)))
        );
    }

    #[test]
    fn test_normalize_rejects_unrepresentable_timestamp() {
        let raw = RawTick::new(InstrumentId::new(1), i64::MIN, 10.0, 5);
        assert_eq!(
            raw.normalize(),
            Err(TickRejection::InvalidTimestamp {
                instrument: InstrumentId::new(1),
                timestamp: i64::MIN,
            })
        );
    }

    #[test]
    fn test_normalize_rejects_bad_price() {
        let mut raw = RawTick::new(InstrumentId::new(1), TS, f64::NAN, 5);
        assert!(matches!(
            raw.normalize(),
            Err(TickRejection::InvalidPrice { .. })
        ));

        raw.last_price = Some(-1.0);
        assert!(matches!(
            raw.normalize(),
            Err(TickRejection::InvalidPrice { .. })
        ));

        raw.last_price = None;
        assert_eq!(
            raw.normalize(),
            Err(TickRejection::MissingPrice(InstrumentId::new(1)))
        );
    }

    #[test]
    fn test_normalize_rejects_negative_volume() {
        let raw = RawTick::new(InstrumentId::new(9), TS, 10.0, -3);
        assert_eq!(
            raw.normalize(),
            Err(TickRejection::InvalidVolume {
                instrument: InstrumentId::new(9),
                volume: -3,
            })
        );
    }

    #[test]
    fn test_raw_tick_accepts_feed_field_names() {
        let json = r#"{
            "instrument_token": 738561,
            "exchange_timestamp": 1708123456000000000,
            "last_price": 2950.25,
            "volume_traded": 120034,
            "mode": "full"
        }"#;
        let raw: RawTick = serde_json::from_str(json).unwrap();
        assert_eq!(raw.instrument_id, InstrumentId::new(738561));
        assert_eq!(raw.cumulative_volume, Some(120_034));
    }

    #[test]
    fn test_raw_tick_missing_fields_deserialize_as_none() {
        let raw: RawTick = serde_json::from_str(r#"{"instrument_id": 5}"#).unwrap();
        assert_eq!(raw.exchange_timestamp, None);
        assert_eq!(raw.last_price, None);
        assert_eq!(raw.cumulative_volume, None);
    }

    #[test]
    fn test_feed_event_tagged_format() {
        let event: FeedEvent =
            serde_json::from_str(r#"{"event": "disconnected", "code": 1006, "reason": "eof"}"#)
                .unwrap();
        assert_eq!(
            event,
            FeedEvent::Disconnected {
                code: Some(1006),
                reason: "eof".to_string(),
            }
        );
        assert_eq!(event.event_type_label(), "Disconnected");

        let connected: FeedEvent = serde_json::from_str(r#"{"event": "connected"}"#).unwrap();
        assert_eq!(connected, FeedEvent::Connected);
    }
}
