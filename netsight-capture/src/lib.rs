//! # netsight-capture
//!
//! Live packet capture: classifies frames from a pcap device, accumulates
//! per-second counters and flushes them into the aggregate store.
//!
//! ### Key Submodules:
//! - `classify`: frame → addresses, direction and transport ports
//! - `source`: pcap-backed packet sources and device enumeration
//! - `session`: the ingestion loop for one interface
//! - `manager`: start/stop/switch supervision over one session slot

pub mod classify;
pub mod error;
pub mod manager;
pub mod packet;
pub mod session;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{Classification, Classifier, Ports};
pub use error::CaptureError;
pub use manager::{CaptureManager, DeviceOpener, PcapOpener};
pub use packet::{Frame, LinkType};
pub use session::{CaptureSession, SessionCounters, SessionSettings};
pub use source::{devices, select_interface, DeviceInfo, PacketSource, PcapSource};
