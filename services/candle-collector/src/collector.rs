//! Collector: the per-shard tick-processing orchestrator
//!
//! Owns the shard's instrument table, volume baselines, candle builders and
//! store handle. The feed adapter calls `ingest_batch` for every tick batch;
//! calls must be sequential, which is what lets the per-instrument state go
//! without locks.
//!
//! Per tick:
//! 1. resolve the token to a stock code (unknown → discard)
//! 2. validate timestamp, price and volume (malformed or out of range → discard)
//! 3. convert cumulative volume to a delta
//! 4. aggregate into the open candle
//! 5. append the finalized candle, if any, then overwrite the snapshot
//!
//! A failed store write is logged and counted, never retried, and never
//! stops the rest of the batch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tick_types::errors::TickRejection;
use tick_types::ids::{InstrumentId, StockCode};
use tracing::{debug, error, info, trace, warn};

use crate::candles::{Candle, CandleAggregator};
use crate::config::{validate_universe, CollectorConfig, ConfigError, InstrumentConfig};
use crate::events::RawTick;
use crate::metrics::CollectorMetrics;
use crate::shard::ShardSpec;
use crate::store::CandleStore;
use crate::volume::VolumeDeltaTracker;

/// What a single accepted tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub code: StockCode,
    /// Open candle after the tick, as written to the snapshot slot.
    pub snapshot: Candle,
    /// Candle sealed by this tick, as appended to history.
    pub finalized: Option<Candle>,
    /// Store writes that failed for this tick.
    pub failed_writes: u64,
}

/// Totals for one `ingest_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: u64,
    pub discarded: u64,
    pub finalized: u64,
    pub failed_writes: u64,
}

impl BatchSummary {
    /// Add another summary's totals to this one.
    pub fn absorb(&mut self, other: BatchSummary) {
        self.processed += other.processed;
        self.discarded += other.discarded;
        self.finalized += other.finalized;
        self.failed_writes += other.failed_writes;
    }
}

/// Tick-to-candle pipeline for one shard.
pub struct Collector<S: CandleStore> {
    shard: ShardSpec,
    codes: BTreeMap<InstrumentId, StockCode>,
    volumes: VolumeDeltaTracker,
    candles: CandleAggregator,
    store: S,
    config: CollectorConfig,
    metrics: Arc<CollectorMetrics>,
}

impl<S: CandleStore> Collector<S> {
    /// Build a collector for this shard's slice of the universe.
    ///
    /// Fails if the universe is invalid or the shard ends up owning no
    /// instruments.
    pub fn new(
        universe: &[InstrumentConfig],
        shard: ShardSpec,
        config: CollectorConfig,
        store: S,
    ) -> Result<Self, ConfigError> {
        validate_universe(universe)?;

        let owned = shard.partition(universe);
        if owned.is_empty() {
            return Err(ConfigError::EmptyShard {
                shard: shard.to_string(),
                universe: universe.len(),
            });
        }

        let codes: BTreeMap<InstrumentId, StockCode> = owned
            .into_iter()
            .map(|entry| (entry.instrument_token, entry.stock_code))
            .collect();
        let candles = CandleAggregator::new(codes.keys().copied(), config.stale_policy);

        info!(
            shard = %shard,
            instruments = codes.len(),
            universe = universe.len(),
            history_limit = config.history_limit,
            stale_policy = ?config.stale_policy,
            "Collector initialized"
        );

        Ok(Self {
            shard,
            codes,
            volumes: VolumeDeltaTracker::new(),
            candles,
            store,
            config,
            metrics: Arc::new(CollectorMetrics::new()),
        })
    }

    /// Instruments to subscribe to, in ascending token order.
    pub fn subscription(&self) -> Vec<InstrumentId> {
        self.codes.keys().copied().collect()
    }

    /// Feed connected: return the instruments to subscribe.
    pub fn on_connect(&self) -> Vec<InstrumentId> {
        let tokens = self.subscription();
        info!(
            shard = %self.shard,
            tokens = tokens.len(),
            "Feed connected, subscribing"
        );
        tokens
    }

    /// Feed disconnected. Reconnecting is the feed client's job.
    pub fn on_disconnect(&self, code: Option<u16>, reason: &str) {
        warn!(shard = %self.shard, code = ?code, reason, "Feed disconnected");
    }

    /// Feed reported an error.
    pub fn on_error(&self, code: Option<u16>, reason: &str) {
        warn!(shard = %self.shard, code = ?code, reason, "Feed error");
    }

    /// Process a batch of ticks in order.
    ///
    /// Never fails: rejected ticks and failed writes are counted in the
    /// returned summary and the shard metrics.
    pub fn ingest_batch(&mut self, ticks: &[RawTick]) -> BatchSummary {
        let start = Instant::now();
        let mut summary = BatchSummary::default();

        for tick in ticks {
            self.metrics.record_tick_received();

            match self.ingest_tick(tick) {
                Ok(outcome) => {
                    self.metrics.record_tick_processed();
                    summary.processed += 1;
                    summary.failed_writes += outcome.failed_writes;
                    if outcome.finalized.is_some() {
                        summary.finalized += 1;
                    }
                }
                Err(rejection) => {
                    match rejection {
                        TickRejection::UnknownInstrument(_) => {
                            trace!(instrument = %tick.instrument_id, "Ignoring tick for unowned instrument");
                        }
                        _ => {
                            debug!(reason = rejection.label(), %rejection, "Discarding tick");
                        }
                    }
                    self.metrics.record_tick_discarded(rejection.label());
                    summary.discarded += 1;
                }
            }
        }

        self.metrics.record_batch(start.elapsed().as_nanos() as u64);
        summary
    }

    /// Process a single tick.
    ///
    /// A rejected tick leaves every piece of state untouched and writes
    /// nothing to the store.
    pub fn ingest_tick(&mut self, tick: &RawTick) -> Result<TickOutcome, TickRejection> {
        let instrument = tick.instrument_id;
        let code = self
            .codes
            .get(&instrument)
            .ok_or(TickRejection::UnknownInstrument(instrument))?;

        let tick = tick.normalize()?;

        // Stale check runs before the volume baseline moves
        self.candles.check(instrument, tick.minute)?;

        let volume_delta = self.volumes.update(instrument, tick.cumulative_volume);
        let result = self
            .candles
            .ingest(instrument, tick.minute, tick.price, volume_delta)?;

        let mut failed_writes = 0;

        if let Some(finalized) = &result.finalized {
            self.metrics.record_candle_finalized();
            debug!(
                code = %code,
                minute = %finalized.minute,
                open = finalized.open,
                high = finalized.high,
                low = finalized.low,
                close = finalized.close,
                volume = finalized.volume,
                "Candle finalized"
            );

            if let Err(err) = self
                .store
                .append_finalized(code, finalized, self.config.history_limit)
            {
                error!(code = %code, minute = %finalized.minute, error = %err, "Failed to append finalized candle");
                self.metrics.record_finalize_write_failure();
                failed_writes += 1;
            }
        }

        if let Err(err) = self.store.set_current_snapshot(code, &result.snapshot) {
            warn!(code = %code, minute = %result.snapshot.minute, error = %err, "Failed to write candle snapshot");
            self.metrics.record_snapshot_write_failure();
            failed_writes += 1;
        }

        trace!(code = %code, minute = %result.snapshot.minute, volume_delta, "Tick saved");

        Ok(TickOutcome {
            code: code.clone(),
            snapshot: result.snapshot,
            finalized: result.finalized,
            failed_writes,
        })
    }

    /// Stock code for an owned instrument.
    pub fn code_for(&self, instrument: InstrumentId) -> Option<&StockCode> {
        self.codes.get(&instrument)
    }

    /// Open candle for an owned instrument.
    pub fn current_candle(&self, instrument: InstrumentId) -> Option<&Candle> {
        self.candles.current_candle(instrument)
    }

    /// Last cumulative volume seen for an instrument.
    pub fn volume_baseline(&self, instrument: InstrumentId) -> Option<u64> {
        self.volumes.baseline(instrument)
    }

    pub fn instrument_count(&self) -> usize {
        self.codes.len()
    }

    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<CollectorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
