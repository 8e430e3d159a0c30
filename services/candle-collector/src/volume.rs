//! Cumulative-to-delta volume conversion
//!
//! The feed reports a running session volume per instrument. Candles need
//! the volume traded since the previous tick, so each instrument keeps the
//! last cumulative value it saw as a baseline.
//!
//! Backward jumps (session reset, out-of-order delivery) clamp to zero and
//! re-base, so a reset costs at most the volume of the reset tick.

use std::collections::BTreeMap;

use tick_types::ids::InstrumentId;

/// Delta between two cumulative observations.
///
/// The first observation has no baseline and yields zero.
pub fn volume_delta(previous: Option<u64>, current: u64) -> u64 {
    match previous {
        Some(previous) => current.saturating_sub(previous),
        None => 0,
    }
}

/// Per-instrument cumulative volume baselines.
#[derive(Debug, Default)]
pub struct VolumeDeltaTracker {
    baselines: BTreeMap<InstrumentId, u64>,
}

impl VolumeDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cumulative observation and return the traded delta.
    ///
    /// The baseline always moves to `cumulative_volume`, including when it
    /// went backwards.
    pub fn update(&mut self, instrument: InstrumentId, cumulative_volume: u64) -> u64 {
        let previous = self.baselines.insert(instrument, cumulative_volume);
        volume_delta(previous, cumulative_volume)
    }

    /// Last cumulative value seen for an instrument.
    pub fn baseline(&self, instrument: InstrumentId) -> Option<u64> {
        self.baselines.get(&instrument).copied()
    }

    /// Number of instruments with a baseline.
    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}


// ── Property-Based Tests ────────────────────────────────────────────
