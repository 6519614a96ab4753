//! Traffic data model shared by capture, aggregation and history.
//!
//! Field names serialize to the JSON layout consumed by the dashboard and
//! stored in the hourly history buckets.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// Transport protocol of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            other => Err(CoreError::UnknownProtocol(other.to_string())),
        }
    }
}

/// Accepts the same spellings as [`FromStr`].
impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

/// Traffic direction relative to the monitored host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Directed 5-tuple. `a -> b` and `b -> a` are different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
    pub protocol: Protocol,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            std::net::SocketAddr::new(self.src_ip, self.src_port),
            std::net::SocketAddr::new(self.dst_ip, self.dst_port),
            self.protocol
        )
    }
}

/// Counters for one directed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(flatten)]
    pub key: ConnectionKey,
    pub bytes: u64,
    /// Smoothed rate; see [`crate::store::AggregateStore::update_connection`].
    pub bytes_per_sec: u64,
    pub packets: u64,
    pub start_time: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Connection {
    /// Fresh connection first observed at `now`, with no traffic recorded yet.
    pub fn new(key: ConnectionKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            bytes: 0,
            bytes_per_sec: 0,
            packets: 0,
            start_time: now,
            last_seen: now,
        }
    }
}

/// Cumulative and per-second counters for one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub interface: String,
    pub in_bytes: u64,
    pub out_bytes: u64,
    pub in_bytes_per_sec: u64,
    pub out_bytes_per_sec: u64,
    pub in_packets: u64,
    pub out_packets: u64,
    pub in_packets_per_sec: u64,
    pub out_packets_per_sec: u64,
}

impl InterfaceStats {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }

    /// Accounts one packet of `len` bytes in the given direction.
    pub fn record(&mut self, direction: Direction, len: u64) {
        match direction {
            Direction::Incoming => {
                self.in_bytes += len;
                self.in_bytes_per_sec += len;
                self.in_packets += 1;
                self.in_packets_per_sec += 1;
            }
            Direction::Outgoing => {
                self.out_bytes += len;
                self.out_bytes_per_sec += len;
                self.out_packets += 1;
                self.out_packets_per_sec += 1;
            }
        }
    }

    /// Zeroes the per-second counters. Cumulative counters are kept.
    pub fn reset_per_second(&mut self) {
        self.in_bytes_per_sec = 0;
        self.out_bytes_per_sec = 0;
        self.in_packets_per_sec = 0;
        self.out_packets_per_sec = 0;
    }
}

/// Point-in-time copy of the current interface and its active connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub timestamp: DateTime<Utc>,
    pub interface: Option<InterfaceStats>,
    pub connections: Vec<Connection>,
}

/// Per-second interface counters of one persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDataPoint {
    pub timestamp: DateTime<Utc>,
    pub in_bytes: u64,
    pub out_bytes: u64,
    pub in_packets: u64,
    pub out_packets: u64,
}

impl HistoricalDataPoint {
    /// Snapshots taken before any interface tick carry no data point.
    pub fn from_snapshot(snapshot: &TrafficSnapshot) -> Option<Self> {
        snapshot.interface.as_ref().map(|iface| Self {
            timestamp: snapshot.timestamp,
            in_bytes: iface.in_bytes_per_sec,
            out_bytes: iface.out_bytes_per_sec,
            in_packets: iface.in_packets_per_sec,
            out_packets: iface.out_packets_per_sec,
        })
    }
}

/// Optional constraints over active connections. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
}

impl Filter {
    pub fn matches(&self, conn: &Connection) -> bool {
        let key = &conn.key;
        if let Some(ip) = self.ip {
            if key.src_ip != ip && key.dst_ip != ip {
                return false;
            }
        }
        if let Some(port) = self.port {
            if key.src_port != port && key.dst_port != port {
                return false;
            }
        }
        if let Some(protocol) = self.protocol {
            if key.protocol != protocol {
                return false;
            }
        }
        true
    }
}
