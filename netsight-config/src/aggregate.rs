//! Aggregation and capture-lifecycle timing.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// How capture sessions feed the aggregate store and how long a connection
/// stays visible after its last packet.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct AggregateConfig {
    /// Per-second counters are pushed into the store at this interval.
    #[validate(range(min = 10, max = 60000))]
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_active_window")]
    pub active_window_secs: u64,
}

fn default_flush_interval() -> u64 {
    1000
}

fn default_active_window() -> u64 {
    5
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval(),
            active_window_secs: default_active_window(),
        }
    }
}

/// Capture manager parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ManagerConfig {
    /// Longest wait for a cancelled session to exit before it is aborted.
    #[validate(range(min = 10, max = 30000))]
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,
}

fn default_grace_period() -> u64 {
    2000
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period(),
        }
    }
}
