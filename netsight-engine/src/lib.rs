//! # netsight-engine
//!
//! Wires capture, aggregation and history into one [`Monitor`] that
//! frontends drive. The CLI is one such frontend; a dashboard server would
//! be another, consuming [`Monitor::snapshot_feed`].

mod error;
mod monitor;

pub use error::EngineError;
pub use monitor::Monitor;
