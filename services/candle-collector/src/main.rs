use std::path::PathBuf;

use anyhow::Context;
use candle_collector::candles::StalePolicy;
use candle_collector::collector::Collector;
use candle_collector::config::{self, CollectorConfig, DEFAULT_CONFIG_FILE, DEFAULT_HISTORY_LIMIT};
use candle_collector::feed::{self, ReplayFeed};
use candle_collector::shard::ShardSpec;
use candle_collector::store::MemoryStore;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(
    name = "candle-collector",
    version,
    about = "Aggregate live feed ticks into one-minute OHLCV candles"
)]
struct Cli {
    /// Instrument universe JSON file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Total number of collector shards
    #[arg(long, default_value_t = 1)]
    shards: usize,

    /// Zero-based index of this shard
    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Finalized candles kept per instrument
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    history: usize,

    /// Discard ticks older than the open candle's minute
    #[arg(long)]
    reject_stale_ticks: bool,

    /// JSON-lines file of feed events; stdin when omitted
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Write the final store contents to this file as JSON
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let universe = config::load_universe(&cli.config)
        .with_context(|| format!("loading instrument universe from {}", cli.config.display()))?;
    let shard = ShardSpec::new(cli.index, cli.shards)?;
    let stale_policy = if cli.reject_stale_ticks {
        StalePolicy::RejectStale
    } else {
        StalePolicy::TrustTickOrder
    };
    let collector_config = CollectorConfig::new(cli.history, stale_policy);

    let mut collector = Collector::new(&universe, shard, collector_config, MemoryStore::new())?;

    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let source = match &cli.replay {
        Some(path) => feed::spawn_replay(path.clone(), sender),
        None => tokio::spawn(async move {
            feed::replay_reader(tokio::io::stdin(), "stdin", sender).await
        }),
    };

    let mut client = ReplayFeed::new();
    tokio::select! {
        summary = feed::run_feed(&mut collector, &mut client, receiver) => {
            tracing::info!(
                connects = summary.connects,
                disconnects = summary.disconnects,
                errors = summary.errors,
                "Feed loop finished"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    source.abort();
    match source.await {
        Ok(Err(err)) => tracing::error!(error = %err, "Feed source failed"),
        Ok(Ok(_)) | Err(_) => {}
    }

    let metrics = collector.metrics().snapshot();
    tracing::info!(metrics = %serde_json::to_string(&metrics)?, "Collector stopped");

    if let Some(path) = &cli.dump {
        let dump = serde_json::to_string_pretty(&collector.store().to_json()?)?;
        std::fs::write(path, dump)
            .with_context(|| format!("writing store dump to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Store dumped");
    }

    Ok(())
}
