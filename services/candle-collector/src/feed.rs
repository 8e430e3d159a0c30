//! Feed client boundary
//!
//! The feed client owns the connection: connecting, reconnecting and
//! decoding are its concern. It hands the collector a stream of
//! `FeedEvent`s over a channel and accepts subscription requests.
//!
//! `run_feed` is the shard's single consumer loop. It takes events one at a
//! time, so `Collector::ingest_batch` is never entered concurrently.

use std::path::PathBuf;

use tick_types::ids::InstrumentId;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::collector::{BatchSummary, Collector};
use crate::events::FeedEvent;
use crate::store::CandleStore;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("subscription rejected: {0}")]
    Subscribe(String),

    #[error("feed I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streaming detail requested for subscribed instruments.
///
/// Only full mode carries the exchange timestamp and cumulative volume the
/// candles are built from, so it is the only mode requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Full,
}

/// Subscription side of a feed client.
pub trait FeedClient {
    fn subscribe(&mut self, instruments: &[InstrumentId], mode: FeedMode) -> Result<(), FeedError>;
}

/// Totals for one `run_feed` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub connects: u64,
    pub disconnects: u64,
    pub errors: u64,
    pub batches: u64,
    pub ticks: BatchSummary,
}

/// Consume feed events until the channel closes.
pub async fn run_feed<S, F>(
    collector: &mut Collector<S>,
    client: &mut F,
    mut events: mpsc::Receiver<FeedEvent>,
) -> RunSummary
where
    S: CandleStore,
    F: FeedClient,
{
    let mut summary = RunSummary::default();

    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Connected => {
                summary.connects += 1;
                let tokens = collector.on_connect();
                if let Err(err) = client.subscribe(&tokens, FeedMode::Full) {
                    error!(error = %err, tokens = tokens.len(), "Subscription failed");
                }
            }
            FeedEvent::Ticks { ticks } => {
                summary.batches += 1;
                summary.ticks.absorb(collector.ingest_batch(&ticks));
            }
            FeedEvent::Disconnected { code, reason } => {
                summary.disconnects += 1;
                collector.on_disconnect(code, &reason);
            }
            FeedEvent::Error { code, reason } => {
                summary.errors += 1;
                collector.on_error(code, &reason);
            }
        }
    }

    info!(
        batches = summary.batches,
        processed = summary.ticks.processed,
        discarded = summary.ticks.discarded,
        finalized = summary.ticks.finalized,
        "Feed closed"
    );
    summary
}

/// Feed client that replays recorded events from a JSON-lines file.
#[derive(Debug, Default)]
pub struct ReplayFeed {
    subscriptions: Vec<(Vec<InstrumentId>, FeedMode)>,
}

impl ReplayFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscription requests received so far.
    pub fn subscriptions(&self) -> &[(Vec<InstrumentId>, FeedMode)] {
        &self.subscriptions
    }
}

impl FeedClient for ReplayFeed {
    fn subscribe(&mut self, instruments: &[InstrumentId], mode: FeedMode) -> Result<(), FeedError> {
        info!(tokens = instruments.len(), mode = ?mode, "Replay feed subscribed");
        self.subscriptions.push((instruments.to_vec(), mode));
        Ok(())
    }
}

/// Counts from reading a replay file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events_sent: u64,
    pub lines_skipped: u64,
}

/// Parse one replay line; blank lines and `#` comments yield `None`.
pub fn parse_replay_line(line: &str) -> Option<Result<FeedEvent, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

/// Replay a JSON-lines file of `FeedEvent`s into `sender`.
///
/// A `Connected` event is sent first, as a live client would on connect.
/// Malformed lines are skipped. Returns when the file ends or the receiver
/// is dropped; the sender is dropped on return, closing the channel.
pub async fn replay_file(
    path: PathBuf,
    sender: mpsc::Sender<FeedEvent>,
) -> Result<ReplayStats, FeedError> {
    let file = File::open(&path).await?;
    replay_reader(file, &path.display().to_string(), sender).await
}

/// Replay JSON-lines `FeedEvent`s from any async reader, such as stdin.
pub async fn replay_reader<R>(
    reader: R,
    source: &str,
    sender: mpsc::Sender<FeedEvent>,
) -> Result<ReplayStats, FeedError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut stats = ReplayStats::default();

    if sender.send(FeedEvent::Connected).await.is_err() {
        return Ok(stats);
    }
    stats.events_sent += 1;

    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_replay_line(&line) {
            None => continue,
            Some(Ok(event)) => {
                if sender.send(event).await.is_err() {
                    break;
                }
                stats.events_sent += 1;
            }
            Some(Err(err)) => {
                warn!(source, line = line_no, error = %err, "Skipping malformed replay line");
                stats.lines_skipped += 1;
            }
        }
    }

    info!(
        source,
        events = stats.events_sent,
        skipped = stats.lines_skipped,
        "Replay finished"
    );
    Ok(stats)
}

/// Run `replay_file` on its own task.
pub fn spawn_replay(
    path: PathBuf,
    sender: mpsc::Sender<FeedEvent>,
) -> JoinHandle<Result<ReplayStats, FeedError>> {
    tokio::spawn(replay_file(path, sender))
}
