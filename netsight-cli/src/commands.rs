use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use netsight_config::NetsightConfig;
use netsight_core::HistoricalDataPoint;
use netsight_engine::Monitor;
use netsight_history::HistoryStore;
use netsight_telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "netsight", version, about)]
pub struct Cli {
    /// Configuration file; defaults to `config/netsight.yaml` plus environment
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture live traffic until Ctrl-C
    Run(RunArgs),
    /// List capture devices as JSON
    Interfaces,
    /// Print stored per-second interface counters as JSON
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Interface to capture on; overrides `capture.interface`
    #[arg(short, long)]
    pub interface: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Range start (RFC 3339); defaults to one hour before `--end`
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
    /// Range end (RFC 3339); defaults to now
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
    /// Overrides `history.data_dir`
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl HistoryArgs {
    fn range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end.unwrap_or(now);
        let start = self.start.unwrap_or(end - chrono::Duration::hours(1));
        (start, end)
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<NetsightConfig> {
    let config = match path {
        Some(path) => NetsightConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NetsightConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

pub fn init_logging(config: &NetsightConfig) -> anyhow::Result<()> {
    netsight_telemetry::init_logging(
        &config.telemetry.log_level,
        LogFormat::from_name(&config.telemetry.log_format),
    )
    .context("installing log subscriber")
}

pub async fn run(args: RunArgs, mut config: NetsightConfig) -> anyhow::Result<()> {
    if let Some(interface) = args.interface {
        config.capture.interface = interface;
    }

    let monitor = Monitor::from_config(&config)?;
    let interface = monitor.start(&config.capture.interface).await?;
    info!(interface = %interface, "Monitoring started, press Ctrl-C to stop");

    let cancel = CancellationToken::new();
    let recorder = monitor.spawn_history_recorder(cancel.clone());
    let mut feed = monitor.snapshot_feed(
        Duration::from_millis(config.aggregate.flush_interval_ms),
        cancel.clone(),
    );

    let summary = tokio::spawn(async move {
        while let Some(snapshot) = feed.recv().await {
            if let Some(iface) = snapshot.interface {
                info!(
                    interface = %iface.interface,
                    in_bps = iface.in_bytes_per_sec,
                    out_bps = iface.out_bytes_per_sec,
                    in_pps = iface.in_packets_per_sec,
                    out_pps = iface.out_packets_per_sec,
                    connections = snapshot.connections.len(),
                    "Traffic"
                );
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Shutting down");

    cancel.cancel();
    monitor.stop().await;
    recorder.await?;
    summary.await?;
    monitor.save_snapshot_in_background().await?;

    debug!(metrics = %monitor.metrics().gather_metrics()?, "Final metrics");
    Ok(())
}

pub fn interfaces() -> anyhow::Result<()> {
    let devices = netsight_capture::devices()?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}

pub async fn history(args: HistoryArgs, config: NetsightConfig) -> anyhow::Result<()> {
    let points = query_history(args, config).await?;
    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}

/// Reads the requested range on the blocking pool.
async fn query_history(
    args: HistoryArgs,
    config: NetsightConfig,
) -> anyhow::Result<Vec<HistoricalDataPoint>> {
    let (start, end) = args.range(Utc::now());
    let dir = args.data_dir.unwrap_or(config.history.data_dir);

    tokio::task::spawn_blocking(move || {
        let store = HistoryStore::open(&dir)
            .with_context(|| format!("opening history at {}", dir.display()))?;
        Ok(store.historical_data(start, end))
    })
    .await
    .context("history query task")?
}
