//! ## netsight-telemetry::metrics
//! **Prometheus counters for capture and persistence**

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub packets_captured: IntCounter,
    pub packets_ignored: IntCounter,
    pub bytes_captured: IntCounter,
    pub flushes: IntCounter,
    pub active_connections: IntGauge,
    pub history_saves: IntCounter,
    pub history_save_failures: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let packets_captured = IntCounter::new(
            "netsight_packets_captured_total",
            "Frames with an IP layer accounted to the interface",
        )?;
        let packets_ignored = IntCounter::new(
            "netsight_packets_ignored_total",
            "Frames skipped as non-IP, unsupported or malformed",
        )?;
        let bytes_captured =
            IntCounter::new("netsight_bytes_captured_total", "Bytes of accounted frames")?;
        let flushes = IntCounter::new(
            "netsight_flushes_total",
            "Per-second counter flushes into the aggregate store",
        )?;
        let active_connections = IntGauge::new(
            "netsight_active_connections",
            "Active connections in the most recent snapshot",
        )?;
        let history_saves = IntCounter::new(
            "netsight_history_saves_total",
            "Snapshots persisted to the hourly history",
        )?;
        let history_save_failures = IntCounter::new(
            "netsight_history_save_failures_total",
            "Snapshots that failed to persist",
        )?;

        registry.register(Box::new(packets_captured.clone()))?;
        registry.register(Box::new(packets_ignored.clone()))?;
        registry.register(Box::new(bytes_captured.clone()))?;
        registry.register(Box::new(flushes.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(history_saves.clone()))?;
        registry.register(Box::new(history_save_failures.clone()))?;

        Ok(Self {
            registry,
            packets_captured,
            packets_ignored,
            bytes_captured,
            flushes,
            active_connections,
            history_saves,
            history_save_failures,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.packets_captured.inc_by(3);
        metrics.active_connections.set(2);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("netsight_packets_captured_total 3"));
        assert!(text.contains("netsight_active_connections 2"));
    }

    #[test]
    fn recorders_are_independent() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.flushes.inc();
        assert_eq!(a.flushes.get(), 1);
        assert_eq!(b.flushes.get(), 0);
    }
}
