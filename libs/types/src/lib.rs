//! Types library for the tick collector
//!
//! Shared identifier and rejection types used by every collector shard and
//! by downstream readers of the candle store.
//!
//! # Modules
//! - `ids`: Instrument identifiers (InstrumentId, StockCode)
//! - `errors`: Tick rejection and shard parameter error taxonomy

pub mod ids;
pub mod errors;
