//! Candle store boundary
//!
//! The collector writes two things per instrument:
//! - `candle:{CODE}`: the open candle, overwritten on every tick
//! - `candles:{CODE}`: finalized candles, newest first, capped in length
//!
//! Writes are independent overwrite-or-append operations with no
//! cross-instrument transactions. Each instrument's keys are written only
//! by the shard that owns it.

use std::collections::{BTreeMap, VecDeque};

use serde_json::{Map, Value};
use thiserror::Error;
use tick_types::ids::StockCode;

use crate::candles::Candle;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected for {key}: {reason}")]
    WriteRejected { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key of the open-candle slot for an instrument.
pub fn current_key(code: &StockCode) -> String {
    format!("candle:{}", code)
}

/// Key of the finalized-candle list for an instrument.
pub fn history_key(code: &StockCode) -> String {
    format!("candles:{}", code)
}

/// Sink for candle state.
pub trait CandleStore {
    /// Overwrite the open-candle slot. Writing the same candle twice must
    /// leave the store as if it had been written once.
    fn set_current_snapshot(&mut self, code: &StockCode, candle: &Candle) -> Result<(), StoreError>;

    /// Push a finalized candle to the newest end of the history, dropping
    /// the oldest entries beyond `max_history`.
    fn append_finalized(
        &mut self,
        code: &StockCode,
        candle: &Candle,
        max_history: usize,
    ) -> Result<(), StoreError>;
}

/// In-process candle store.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryStore {
    current: BTreeMap<String, Candle>,
    /// Newest at the front.
    history: BTreeMap<String, VecDeque<Candle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open candle last written for an instrument.
    pub fn current(&self, code: &StockCode) -> Option<&Candle> {
        self.current.get(&current_key(code))
    }

    /// Up to `limit` finalized candles, newest first.
    pub fn recent(&self, code: &StockCode, limit: usize) -> Vec<Candle> {
        self.history
            .get(&history_key(code))
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of finalized candles retained for an instrument.
    pub fn history_len(&self, code: &StockCode) -> usize {
        self.history
            .get(&history_key(code))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.history.is_empty()
    }

    /// Dump all keys as a JSON object.
    pub fn to_json(&self) -> Result<Value, StoreError> {
        let mut out = Map::new();
        for (key, candle) in &self.current {
            out.insert(key.clone(), serde_json::to_value(candle)?);
        }
        for (key, list) in &self.history {
            out.insert(key.clone(), serde_json::to_value(list)?);
        }
        Ok(Value::Object(out))
    }
}

impl CandleStore for MemoryStore {
    fn set_current_snapshot(&mut self, code: &StockCode, candle: &Candle) -> Result<(), StoreError> {
        self.current.insert(current_key(code), candle.clone());
        Ok(())
    }

    fn append_finalized(
        &mut self,
        code: &StockCode,
        candle: &Candle,
        max_history: usize,
    ) -> Result<(), StoreError> {
        let list = self.history.entry(history_key(code)).or_default();
        list.push_front(candle.clone());
        list.truncate(max_history);
        Ok(())
    }
}
