// netsight-config/src/capture.rs
//! Packet capture configuration.
//!
//! Controls how the live pcap handle is opened and which address ranges
//! count as "local" when deciding traffic direction.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Packet capture configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CaptureConfig {
    /// Interface to capture on. Empty selects the first non-loopback
    /// device that has an address.
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default)]
    pub interface: String,

    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Maximum captured bytes per frame.
    #[validate(range(min = 64, max = 262144))]
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,

    /// Upper bound on how long a blocked read delays cancellation.
    #[validate(range(min = 10, max = 5000))]
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u32,

    /// Frames buffered between the pcap reader thread and the ingestion loop.
    #[validate(range(min = 16, max = 1048576))]
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Destinations inside these networks are counted as incoming.
    #[validate(custom(function = validation::validate_local_networks))]
    #[serde(default = "default_local_networks")]
    pub local_networks: Vec<IpNetwork>,
}

fn default_promiscuous() -> bool {
    true
}

fn default_snaplen() -> i32 {
    65536
}

fn default_read_timeout() -> u32 {
    1000
}

fn default_channel_capacity() -> usize {
    8192
}

/// Loopback, RFC 1918 private ranges and IPv6 loopback / unique-local.
pub fn default_local_networks() -> Vec<IpNetwork> {
    ["127.0.0.0/8", "10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "::1/128", "fc00::/7"]
        .iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            promiscuous: default_promiscuous(),
            snaplen: default_snaplen(),
            read_timeout_ms: default_read_timeout(),
            channel_capacity: default_channel_capacity(),
            local_networks: default_local_networks(),
        }
    }
}
