//! ## netsight-capture::classify
//! **Frame → (addresses, direction, transport) classification**
//!
//! Only the network and transport headers are decoded. Anything without an
//! IPv4/IPv6 layer, or that fails to parse, is ignored. Frames with an IP
//! layer but no TCP/UDP header still count towards interface totals.

use std::net::IpAddr;

use etherparse::{NetHeaders, PacketHeaders, TransportHeader};
use ipnetwork::IpNetwork;

use netsight_core::{ConnectionKey, Direction, Protocol};

use crate::packet::{Frame, LinkType};

const NULL_HEADER_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub src: u16,
    pub dst: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub direction: Direction,
    /// Captured frame length in bytes.
    pub len: u64,
    pub transport: Option<Ports>,
}

impl Classification {
    pub fn connection_key(&self) -> Option<ConnectionKey> {
        self.transport.map(|ports| ConnectionKey {
            src_ip: self.src_ip,
            src_port: ports.src,
            dst_ip: self.dst_ip,
            dst_port: ports.dst,
            protocol: ports.protocol,
        })
    }
}

/// Decides direction by checking destinations against the local networks.
#[derive(Debug, Clone)]
pub struct Classifier {
    local_networks: Vec<IpNetwork>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(netsight_config::default_local_networks())
    }
}

impl Classifier {
    pub fn new(local_networks: Vec<IpNetwork>) -> Self {
        Self { local_networks }
    }

    pub fn is_local(&self, ip: IpAddr) -> bool {
        self.local_networks.iter().any(|net| net.contains(ip))
    }

    pub fn classify(&self, frame: &Frame) -> Option<Classification> {
        let data = &frame.data[..];
        let headers = match frame.link {
            LinkType::Ethernet => PacketHeaders::from_ethernet_slice(data),
            LinkType::Null => PacketHeaders::from_ip_slice(data.get(NULL_HEADER_LEN..)?),
            LinkType::Raw => PacketHeaders::from_ip_slice(data),
            LinkType::LinuxSll => PacketHeaders::from_ip_slice(data.get(SLL_HEADER_LEN..)?),
            LinkType::Unsupported(_) => return None,
        }
        .ok()?;

        let (src_ip, dst_ip) = match headers.net.as_ref()? {
            NetHeaders::Ipv4(ip, _) => (IpAddr::from(ip.source), IpAddr::from(ip.destination)),
            NetHeaders::Ipv6(ip, _) => (IpAddr::from(ip.source), IpAddr::from(ip.destination)),
            #[allow(unreachable_patterns)]
            _ => return None,
        };

        let transport = match headers.transport.as_ref() {
            Some(TransportHeader::Tcp(tcp)) => Some(Ports {
                src: tcp.source_port,
                dst: tcp.destination_port,
                protocol: Protocol::Tcp,
            }),
            Some(TransportHeader::Udp(udp)) => Some(Ports {
                src: udp.source_port,
                dst: udp.destination_port,
                protocol: Protocol::Udp,
            }),
            _ => None,
        };

        let direction = if self.is_local(dst_ip) {
            Direction::Incoming
        } else {
            Direction::Outgoing
        };

        Some(Classification {
            src_ip,
            dst_ip,
            direction,
            len: frame.len() as u64,
            transport,
        })
    }
}
