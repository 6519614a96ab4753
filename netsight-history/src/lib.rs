//! # netsight-history
//!
//! Hour-bucketed on-disk log of traffic snapshots.
//!
//! Each bucket is one JSON array of snapshots in
//! `traffic_<YYYY-MM-DD_HH>.json`, keyed by the local wall-clock hour of the
//! snapshot timestamp. Buckets are rewritten whole through a temp file and
//! rename, so a reader never sees a half-written bucket.

pub mod error;
mod store;

pub use error::HistoryError;
pub use store::{bucket_name, HistoryStore};
