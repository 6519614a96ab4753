//! # netsight-core
//!
//! Traffic data model and the in-memory aggregate that capture sessions
//! write into and dashboards read from.
//!
//! ### Key Submodules:
//! - `model`: connection keys, counters, snapshots and filters
//! - `store`: the `RwLock`-guarded aggregate with its sink/reader traits

pub mod error;
pub mod model;
pub mod store;

pub use error::CoreError;
pub use model::{
    Connection, ConnectionKey, Direction, Filter, HistoricalDataPoint, InterfaceStats, Protocol,
    TrafficSnapshot,
};
pub use store::{AggregateStore, TrafficReader, TrafficSink};
