//! Counters for the tick-processing path
//!
//! Tracks ticks received, processed and discarded, candles finalized,
//! failed store writes, and per-batch processing latency. Counters are
//! relaxed atomics so a reporter task can read them while the consumer loop
//! writes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Core metrics for one collector shard.
pub struct CollectorMetrics {
    // Ticks
    pub ticks_received: AtomicU64,
    pub ticks_processed: AtomicU64,
    pub ticks_discarded: AtomicU64,

    // Candles
    pub candles_finalized: AtomicU64,

    // Store
    pub snapshot_write_failures: AtomicU64,
    pub finalize_write_failures: AtomicU64,

    // Batches
    pub batches: AtomicU64,
    pub batch_processing_ns: Mutex<LatencyTracker>,

    // Discards by reason label
    discard_reasons: Mutex<BTreeMap<&'static str, u64>>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_received: u64,
    pub ticks_processed: u64,
    pub ticks_discarded: u64,
    pub candles_finalized: u64,
    pub snapshot_write_failures: u64,
    pub finalize_write_failures: u64,
    pub batches: u64,
    pub batch_p99_ns: Option<u64>,
    pub discard_reasons: BTreeMap<&'static str, u64>,
}

impl CollectorMetrics {
    pub fn new() -> Self {
        Self {
            ticks_received: AtomicU64::new(0),
            ticks_processed: AtomicU64::new(0),
            ticks_discarded: AtomicU64::new(0),
            candles_finalized: AtomicU64::new(0),
            snapshot_write_failures: AtomicU64::new(0),
            finalize_write_failures: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            batch_processing_ns: Mutex::new(LatencyTracker::new(1000)),
            discard_reasons: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_tick_received(&self) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_processed(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discarded tick under its reason label.
    pub fn record_tick_discarded(&self, reason: &'static str) {
        self.ticks_discarded.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut reasons) = self.discard_reasons.lock() {
            *reasons.entry(reason).or_insert(0) += 1;
        }
    }

    pub fn record_candle_finalized(&self) {
        self.candles_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_write_failure(&self) {
        self.snapshot_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalize_write_failure(&self) {
        self.finalize_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a processed batch and how long it took.
    pub fn record_batch(&self, latency_ns: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut tracker) = self.batch_processing_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let batch_p99_ns = self
            .batch_processing_ns
            .lock()
            .ok()
            .and_then(|tracker| tracker.percentile(99));
        let discard_reasons = self
            .discard_reasons
            .lock()
            .map(|reasons| reasons.clone())
            .unwrap_or_default();

        MetricsSnapshot {
            ticks_received: self.ticks_received.load(Ordering::Relaxed),
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            ticks_discarded: self.ticks_discarded.load(Ordering::Relaxed),
            candles_finalized: self.candles_finalized.load(Ordering::Relaxed),
            snapshot_write_failures: self.snapshot_write_failures.load(Ordering::Relaxed),
            finalize_write_failures: self.finalize_write_failures.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            batch_p99_ns,
            discard_reasons,
        }
    }
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    /// Record a latency sample, evicting the oldest when full.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p.min(100) as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    /// Average latency.
    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }

    /// Number of samples recorded.
    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
