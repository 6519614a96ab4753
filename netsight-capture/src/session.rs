//! ## netsight-capture::session
//! **One live capture handle feeding one aggregate sink**
//!
//! A session owns its [`PacketSource`]. `run` moves the source onto a
//! blocking reader thread that forwards frames over a bounded channel to
//! the ingestion loop. The loop classifies frames into in-session counters
//! and pushes them into the sink once per flush tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use netsight_config::NetsightConfig;
use netsight_core::{Connection, ConnectionKey, InterfaceStats, TrafficSink};
use netsight_telemetry::MetricsRecorder;

use crate::classify::{Classification, Classifier};
use crate::error::CaptureError;
use crate::packet::Frame;
use crate::source::{select_interface, PacketSource, PcapSource};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub flush_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            channel_capacity: 8192,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &NetsightConfig) -> Self {
        Self {
            flush_interval: Duration::from_millis(config.aggregate.flush_interval_ms),
            channel_capacity: config.capture.channel_capacity,
        }
    }
}

/// Per-session accumulators between flushes.
#[derive(Debug)]
pub struct SessionCounters {
    interface: InterfaceStats,
    connections: HashMap<ConnectionKey, Connection>,
}

impl SessionCounters {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: InterfaceStats::new(interface),
            connections: HashMap::new(),
        }
    }

    pub fn record(&mut self, packet: &Classification, now: DateTime<Utc>) {
        self.interface.record(packet.direction, packet.len);

        if let Some(key) = packet.connection_key() {
            let conn = self
                .connections
                .entry(key)
                .or_insert_with(|| Connection::new(key, now));
            conn.bytes += packet.len;
            conn.bytes_per_sec += packet.len;
            conn.packets += 1;
            conn.last_seen = now;
        }
    }

    /// Pushes the interface and every tracked connection into `sink`, then
    /// zeroes the per-second counters.
    pub fn flush(&mut self, sink: &dyn TrafficSink) {
        sink.update_interface(self.interface.clone());
        for conn in self.connections.values_mut() {
            sink.update_connection(conn.clone());
            conn.bytes_per_sec = 0;
        }
        self.interface.reset_per_second();
    }

    pub fn interface(&self) -> &InterfaceStats {
        &self.interface
    }

    pub fn connection(&self, key: &ConnectionKey) -> Option<&Connection> {
        self.connections.get(key)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

pub struct CaptureSession {
    interface: String,
    source: Option<Box<dyn PacketSource>>,
    classifier: Arc<Classifier>,
    settings: SessionSettings,
    metrics: Option<MetricsRecorder>,
}

impl CaptureSession {
    /// Opens a live pcap session. An empty `interface` auto-selects a
    /// device.
    pub fn open(interface: &str, config: &NetsightConfig) -> Result<Self, CaptureError> {
        let name = select_interface(interface)?;
        let source = PcapSource::open(&name, &config.capture)?;
        Ok(Self::from_source(
            name,
            Box::new(source),
            Arc::new(Classifier::new(config.capture.local_networks.clone())),
            SessionSettings::from_config(config),
        ))
    }

    pub fn from_source(
        interface: impl Into<String>,
        source: Box<dyn PacketSource>,
        classifier: Arc<Classifier>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            interface: interface.into(),
            source: Some(source),
            classifier,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Releases the capture handle. Safe to call more than once.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(interface = %self.interface, "Capture handle released");
        }
    }

    /// Runs the ingestion loop until `cancel` fires or the device fails.
    ///
    /// Cancellation returns `Ok(())` without a final flush. The handle is
    /// closed before this returns.
    pub async fn run(
        mut self,
        sink: Arc<dyn TrafficSink>,
        cancel: CancellationToken,
    ) -> Result<(), CaptureError> {
        let source = self.source.take().ok_or(CaptureError::Closed)?;
        let CaptureSession {
            interface,
            classifier,
            settings,
            metrics,
            ..
        } = self;

        let (tx, mut rx) = mpsc::channel(settings.channel_capacity.max(1));
        let reader_cancel = cancel.child_token();
        let reader = {
            let cancel = reader_cancel.clone();
            tokio::task::spawn_blocking(move || read_frames(source, tx, cancel))
        };

        info!(interface = %interface, "Capture session started");

        let flush = settings.flush_interval;
        let mut ticker = interval_at(Instant::now() + flush, flush);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut counters = SessionCounters::new(&interface);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(interface = %interface, "Capture session cancelled");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    counters.flush(sink.as_ref());
                    if let Some(metrics) = &metrics {
                        metrics.flushes.inc();
                    }
                }
                msg = rx.recv() => match msg {
                    Some(Ok(frame)) => ingest(&classifier, metrics.as_ref(), &frame, &mut counters),
                    Some(Err(e)) => {
                        error!(interface = %interface, error = %e, "Capture device failed");
                        break Err(e);
                    }
                    None => break Err(CaptureError::ReaderGone),
                },
            }
        };

        reader_cancel.cancel();
        drop(rx);
        if let Err(e) = reader.await {
            warn!(interface = %interface, error = %e, "Capture reader panicked");
        }
        info!(interface = %interface, "Capture session stopped");
        result
    }
}

fn ingest(
    classifier: &Classifier,
    metrics: Option<&MetricsRecorder>,
    frame: &Frame,
    counters: &mut SessionCounters,
) {
    match classifier.classify(frame) {
        Some(packet) => {
            counters.record(&packet, Utc::now());
            if let Some(metrics) = metrics {
                metrics.packets_captured.inc();
                metrics.bytes_captured.inc_by(packet.len);
            }
        }
        None => {
            if let Some(metrics) = metrics {
                metrics.packets_ignored.inc();
            }
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("interface", &self.interface)
            .field("open", &self.is_open())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Blocking reader loop. Owns the source, so returning closes the device.
fn read_frames(
    mut source: Box<dyn PacketSource>,
    tx: mpsc::Sender<Result<Frame, CaptureError>>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        match source.next_frame() {
            Ok(Some(frame)) => {
                if tx.blocking_send(Ok(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{icmp_frame, tcp_frame, udp_frame, Endpoint, ScriptedSource};
    use netsight_core::{AggregateStore, Protocol};
    use std::sync::atomic::Ordering;

    fn settings(flush_ms: u64) -> SessionSettings {
        SessionSettings {
            flush_interval: Duration::from_millis(flush_ms),
            channel_capacity: 64,
        }
    }

    fn session(source: ScriptedSource, flush_ms: u64) -> CaptureSession {
        CaptureSession::from_source(
            "test0",
            Box::new(source),
            Arc::new(Classifier::default()),
            settings(flush_ms),
        )
    }

    fn remote() -> Endpoint {
        Endpoint::v4([1, 2, 3, 4], 1111)
    }

    fn local() -> Endpoint {
        Endpoint::v4([10, 0, 0, 5], 80)
    }

    #[test]
    fn packets_one_second_apart_merge_across_flushes() {
        let classifier = Classifier::default();
        let store = AggregateStore::new();
        let mut counters = SessionCounters::new("eth0");
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);

        let first = classifier.classify(&tcp_frame(remote(), local(), 100)).unwrap();
        counters.record(&first, t0);
        counters.flush(&store);

        let after_first = store.snapshot_at(t0);
        assert_eq!(after_first.interface.unwrap().in_bytes_per_sec, 100);
        assert_eq!(after_first.connections[0].bytes_per_sec, 100);

        let second = classifier.classify(&tcp_frame(remote(), local(), 200)).unwrap();
        counters.record(&second, t1);
        counters.flush(&store);

        let snapshot = store.snapshot_at(t1);
        let iface = snapshot.interface.unwrap();
        assert_eq!(iface.in_bytes, 300);
        assert_eq!(iface.in_packets, 2);
        assert_eq!(iface.in_bytes_per_sec, 200);
        assert_eq!(iface.in_packets_per_sec, 1);
        assert_eq!(snapshot.connections.len(), 1);
        let conn = &snapshot.connections[0];
        assert_eq!(conn.key.to_string(), "1.2.3.4:1111-10.0.0.5:80-TCP");
        assert_eq!(conn.bytes, 300);
        assert_eq!(conn.packets, 2);
        assert_eq!(conn.bytes_per_sec, 150);
        assert_eq!(conn.start_time, t0);
        assert_eq!(conn.last_seen, t1);
    }

    #[test]
    fn flush_zeroes_only_per_second_counters() {
        let classifier = Classifier::default();
        let store = AggregateStore::new();
        let mut counters = SessionCounters::new("eth0");
        let packet = classifier.classify(&tcp_frame(remote(), local(), 100)).unwrap();
        let key = packet.connection_key().unwrap();

        counters.record(&packet, Utc::now());
        counters.flush(&store);

        assert_eq!(counters.interface().in_bytes, 100);
        assert_eq!(counters.interface().in_bytes_per_sec, 0);
        let conn = counters.connection(&key).unwrap();
        assert_eq!(conn.bytes, 100);
        assert_eq!(conn.bytes_per_sec, 0);
    }

    #[test]
    fn non_transport_packets_only_touch_the_interface() {
        let classifier = Classifier::default();
        let mut counters = SessionCounters::new("eth0");
        let packet = classifier.classify(&icmp_frame([8, 8, 8, 8], [10, 0, 0, 1])).unwrap();
        counters.record(&packet, Utc::now());

        assert_eq!(counters.interface().in_packets, 1);
        assert_eq!(counters.connection_count(), 0);
    }

    #[tokio::test]
    async fn run_flushes_scripted_traffic_into_the_sink() {
        let source = ScriptedSource::frames([
            tcp_frame(remote(), local(), 100),
            tcp_frame(remote(), local(), 200),
            udp_frame(
                Endpoint::v4([192, 168, 1, 2], 5353),
                Endpoint::v4([8, 8, 8, 8], 53),
                80,
            ),
        ]);
        let closed = source.dropped_flag();
        let store = Arc::new(AggregateStore::new());
        let cancel = CancellationToken::new();
        let metrics = MetricsRecorder::new().unwrap();

        let task = tokio::spawn(
            session(source, 20)
                .with_metrics(metrics.clone())
                .run(store.clone(), cancel.clone()),
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        let snapshot = store.snapshot();
        let iface = snapshot.interface.unwrap();
        assert_eq!(iface.interface, "test0");
        assert_eq!(iface.in_bytes, 300);
        assert_eq!(iface.out_packets, 1);
        assert_eq!(snapshot.connections.len(), 2);
        assert!(snapshot
            .connections
            .iter()
            .any(|c| c.key.protocol == Protocol::Udp && c.key.dst_port == 53));
        assert_eq!(metrics.packets_captured.get(), 3);
        assert!(metrics.flushes.get() >= 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn device_error_ends_the_loop() {
        let source = ScriptedSource::new([
            Ok(tcp_frame(remote(), local(), 100)),
            Err(CaptureError::Device(pcap::Error::PcapError("link down".into()))),
        ]);
        let store = Arc::new(AggregateStore::new());

        let result = session(source, 1000)
            .run(store, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CaptureError::Device(_))));
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored_and_counted() {
        let source = ScriptedSource::frames([Frame::ethernet(vec![0u8; 10])]);
        let store = Arc::new(AggregateStore::new());
        let cancel = CancellationToken::new();
        let metrics = MetricsRecorder::new().unwrap();

        let task = tokio::spawn(
            session(source, 20)
                .with_metrics(metrics.clone())
                .run(store.clone(), cancel.clone()),
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(metrics.packets_ignored.get(), 1);
        assert_eq!(store.snapshot().interface.unwrap().in_packets, 0);
    }

    #[tokio::test]
    async fn closed_session_refuses_to_run() {
        let mut s = session(ScriptedSource::frames([]), 1000);
        assert!(s.is_open());
        s.close();
        s.close();
        assert!(!s.is_open());

        let result = s
            .run(Arc::new(AggregateStore::new()), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CaptureError::Closed)));
    }

    #[tokio::test]
    async fn cancellation_before_first_tick_writes_nothing() {
        let source = ScriptedSource::frames([tcp_frame(remote(), local(), 100)]);
        let closed = source.dropped_flag();
        let store = Arc::new(AggregateStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        session(source, 1000).run(store.clone(), cancel).await.unwrap();

        assert!(store.snapshot().interface.is_none());
        assert_eq!(store.connection_count(), 0);
        assert!(closed.load(Ordering::SeqCst));
    }
}
