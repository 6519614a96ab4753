//! ## netsight-capture::manager
//! **Supervises at most one running capture session**
//!
//! The manager slot is either idle or holds the running session's
//! interface, cancellation token and task handle. Every operation takes the
//! slot mutex for its whole duration, so starts, stops and switches never
//! interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Instrument};

use netsight_config::NetsightConfig;
use netsight_core::{AggregateStore, TrafficSink};
use netsight_telemetry::MetricsRecorder;

use crate::error::CaptureError;
use crate::session::CaptureSession;

/// Opens capture sessions by interface name.
pub trait DeviceOpener: Send + Sync {
    /// An empty name asks the opener to pick a device.
    fn open(&self, interface: &str) -> Result<CaptureSession, CaptureError>;
}

/// Opens live pcap sessions from the loaded configuration.
pub struct PcapOpener {
    config: NetsightConfig,
    metrics: Option<MetricsRecorder>,
}

impl PcapOpener {
    pub fn new(config: NetsightConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl DeviceOpener for PcapOpener {
    fn open(&self, interface: &str) -> Result<CaptureSession, CaptureError> {
        let session = CaptureSession::open(interface, &self.config)?;
        Ok(match &self.metrics {
            Some(metrics) => session.with_metrics(metrics.clone()),
            None => session,
        })
    }
}

struct ActiveSession {
    interface: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct CaptureManager {
    store: Arc<AggregateStore>,
    opener: Arc<dyn DeviceOpener>,
    grace_period: Duration,
    slot: Mutex<Option<ActiveSession>>,
}

impl CaptureManager {
    pub fn new(
        store: Arc<AggregateStore>,
        opener: Arc<dyn DeviceOpener>,
        grace_period: Duration,
    ) -> Self {
        Self {
            store,
            opener,
            grace_period,
            slot: Mutex::new(None),
        }
    }

    /// Manager over live pcap devices configured from `config`.
    pub fn from_config(
        store: Arc<AggregateStore>,
        config: &NetsightConfig,
        metrics: Option<MetricsRecorder>,
    ) -> Self {
        let opener = PcapOpener::new(config.clone());
        let opener = match metrics {
            Some(metrics) => opener.with_metrics(metrics),
            None => opener,
        };
        Self::new(
            store,
            Arc::new(opener),
            Duration::from_millis(config.manager.grace_period_ms),
        )
    }

    /// Stops any running session, clears the store and starts capturing on
    /// `interface`. Returns the name actually opened.
    ///
    /// On open failure the manager is left idle with an empty store.
    #[instrument(level = "info", name = "capture_start", skip(self))]
    pub async fn start(&self, interface: &str) -> Result<String, CaptureError> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.take() {
            self.shutdown(active).await;
        }

        self.store.clear();

        let opener = Arc::clone(&self.opener);
        let requested = interface.to_string();
        let session = tokio::task::spawn_blocking(move || opener.open(&requested))
            .await
            .map_err(|e| CaptureError::Task(e.to_string()))??;

        let name = session.interface().to_string();
        let cancel = CancellationToken::new();
        let sink: Arc<dyn TrafficSink> = self.store.clone();
        let task = tokio::spawn(
            {
                let cancel = cancel.clone();
                let name = name.clone();
                async move {
                    if let Err(e) = session.run(sink, cancel).await {
                        error!(interface = %name, error = %e, "Capture session terminated");
                    }
                }
            }
            .instrument(tracing::info_span!("capture_task", interface = %name)),
        );

        info!(interface = %name, "Capture running");
        *slot = Some(ActiveSession {
            interface: name.clone(),
            cancel,
            task,
        });
        Ok(name)
    }

    /// Same as [`CaptureManager::start`].
    pub async fn switch_interface(&self, interface: &str) -> Result<String, CaptureError> {
        self.start(interface).await
    }

    /// Stops the running session, if any. Safe to call when idle.
    #[instrument(level = "info", name = "capture_stop", skip(self))]
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.take() {
            self.shutdown(active).await;
        }
    }

    /// Interface of the running session. `None` when idle or when the
    /// session has ended on its own.
    pub async fn current_interface(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|active| !active.task.is_finished())
            .map(|active| active.interface.clone())
    }

    pub async fn is_running(&self) -> bool {
        self.current_interface().await.is_some()
    }

    async fn shutdown(&self, active: ActiveSession) {
        let ActiveSession {
            interface,
            cancel,
            mut task,
        } = active;

        if task.is_finished() {
            info!(interface = %interface, "Capture session had already ended");
            return;
        }

        cancel.cancel();
        match tokio::time::timeout(self.grace_period, &mut task).await {
            Ok(Ok(())) => info!(interface = %interface, "Capture session stopped"),
            Ok(Err(e)) => warn!(interface = %interface, error = %e, "Capture task failed"),
            Err(_) => {
                warn!(
                    interface = %interface,
                    grace_ms = self.grace_period.as_millis() as u64,
                    "Capture session did not stop in time, aborting"
                );
                task.abort();
            }
        }
    }
}
