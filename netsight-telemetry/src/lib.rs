//! # Netsight Telemetry
//!
//! Logging setup and Prometheus counters for the capture pipeline.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::MetricsRecorder;
