//! Runtime wiring of the traffic monitor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use netsight_capture::CaptureManager;
use netsight_config::NetsightConfig;
use netsight_core::{
    AggregateStore, Connection, Filter, HistoricalDataPoint, TrafficReader, TrafficSnapshot,
};
use netsight_history::HistoryStore;
use netsight_telemetry::MetricsRecorder;

use crate::error::EngineError;

/// Owns the aggregate store, the capture manager and the history store.
pub struct Monitor {
    store: Arc<AggregateStore>,
    manager: CaptureManager,
    history: Arc<HistoryStore>,
    metrics: MetricsRecorder,
    save_interval: Duration,
}

impl Monitor {
    pub fn new(
        store: Arc<AggregateStore>,
        manager: CaptureManager,
        history: Arc<HistoryStore>,
        metrics: MetricsRecorder,
        save_interval: Duration,
    ) -> Self {
        Self {
            store,
            manager,
            history,
            metrics,
            save_interval,
        }
    }

    /// Builds a monitor over live pcap devices.
    pub fn from_config(config: &NetsightConfig) -> Result<Self, EngineError> {
        let metrics = MetricsRecorder::new()?;
        let store = Arc::new(AggregateStore::with_active_window(Duration::from_secs(
            config.aggregate.active_window_secs,
        )));
        let manager = CaptureManager::from_config(store.clone(), config, Some(metrics.clone()));
        let history = Arc::new(HistoryStore::open(&config.history.data_dir)?);
        info!(data_dir = %config.history.data_dir.display(), "Monitor initialised");

        Ok(Self::new(
            store,
            manager,
            history,
            metrics,
            Duration::from_secs(config.history.save_interval_secs),
        ))
    }

    pub async fn start(&self, interface: &str) -> Result<String, EngineError> {
        Ok(self.manager.start(interface).await?)
    }

    pub async fn switch_interface(&self, interface: &str) -> Result<String, EngineError> {
        Ok(self.manager.switch_interface(interface).await?)
    }

    pub async fn stop(&self) {
        self.manager.stop().await;
    }

    pub async fn current_interface(&self) -> Option<String> {
        self.manager.current_interface().await
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        let snapshot = self.store.snapshot();
        self.metrics
            .active_connections
            .set(snapshot.connections.len() as i64);
        snapshot
    }

    pub fn connections(&self, filter: &Filter) -> Vec<Connection> {
        self.store.filtered_connections(filter)
    }

    /// Historical data points in `[start, end]`, read on the blocking pool.
    pub async fn history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoricalDataPoint>, EngineError> {
        let history = Arc::clone(&self.history);
        Ok(tokio::task::spawn_blocking(move || history.historical_data(start, end)).await?)
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    /// Read-only handle for background consumers.
    pub fn reader(&self) -> Arc<dyn TrafficReader> {
        self.store.clone()
    }

    /// Persists the current snapshot without waiting for the write.
    /// Failures are logged and counted.
    pub fn save_snapshot_in_background(&self) -> JoinHandle<()> {
        spawn_save(
            self.snapshot(),
            Arc::clone(&self.history),
            self.metrics.clone(),
        )
    }

    /// Saves one snapshot now and another every save interval until
    /// `cancel` fires.
    #[instrument(level = "info", name = "history_recorder", skip_all)]
    pub fn spawn_history_recorder(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let reader = self.reader();
        let history = Arc::clone(&self.history);
        let metrics = self.metrics.clone();
        let period = self.save_interval;

        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            let snapshot = reader.snapshot();
                            // Detached from the ticker.
                            drop(spawn_save(snapshot, Arc::clone(&history), metrics.clone()));
                        }
                    }
                }
                debug!("History recorder stopped");
            }
            .instrument(tracing::info_span!("history_recorder_task")),
        )
    }

    /// Streams a snapshot every `period` to the returned receiver. The feed
    /// ends when the receiver is dropped or `cancel` fires.
    pub fn snapshot_feed(
        &self,
        period: Duration,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TrafficSnapshot> {
        let (tx, rx) = mpsc::channel(16);
        let reader = self.reader();
        let metrics = self.metrics.clone();

        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tx.closed() => break,
                        _ = ticker.tick() => {
                            let snapshot = reader.snapshot();
                            metrics.active_connections.set(snapshot.connections.len() as i64);
                            if tx.send(snapshot).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                debug!("Snapshot feed closed");
            }
            .instrument(tracing::info_span!("snapshot_feed_task")),
        );
        rx
    }
}

fn spawn_save(
    snapshot: TrafficSnapshot,
    history: Arc<HistoryStore>,
    metrics: MetricsRecorder,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match history.save_snapshot(&snapshot) {
        Ok(()) => metrics.history_saves.inc(),
        Err(e) => {
            warn!(error = %e, "Failed to save history snapshot");
            metrics.history_save_failures.inc();
        }
    })
}
