//! Candle Collector Service
//!
//! Consumes a live tick feed for a fixed instrument universe and produces:
//! - Per-tick volume deltas from cumulative exchange volume
//! - One-minute OHLCV candles keyed on exchange time
//! - A live snapshot of each instrument's open candle
//! - A capped, newest-first history of finalized candles
//!
//! The universe is split across independent shards by list position; each
//! shard runs one sequential consumer loop and owns its instruments' state.
//!
//! # Architecture
//!
//! ```text
//!   Feed client (connect, reconnect, decode)
//!        │  FeedEvent over mpsc
//!    ┌───▼────┐
//!    │run_feed│  ← one consumer per shard
//!    └───┬────┘
//!        │ ingest_batch
//!   ┌────▼──────┐
//!   │ Collector │  ← lookup, normalize, stale check
//!   └──┬─────┬──┘
//!      │     │
//! ┌────▼─┐ ┌─▼──────┐
//! │Volume│ │Candles │
//! └────┬─┘ └─┬──────┘
//!      │     │
//! ┌────▼─────▼──┐
//! │ CandleStore │  candle:{CODE} / candles:{CODE}
//! └─────────────┘
//! ```

pub mod candles;
pub mod collector;
pub mod config;
pub mod events;
pub mod feed;
pub mod metrics;
pub mod shard;
pub mod store;
pub mod volume;
