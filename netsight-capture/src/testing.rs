//! Frame builders and a scripted packet source for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use etherparse::{IpHeaders, PacketBuilder, PacketBuilderStep};

use crate::error::CaptureError;
use crate::packet::Frame;
use crate::source::PacketSource;

const SRC_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
const DST_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

#[derive(Debug, Clone, Copy)]
enum Addr {
    V4([u8; 4]),
    V6([u8; 16]),
}

#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    addr: Addr,
    port: u16,
}

impl Endpoint {
    pub fn v4(ip: [u8; 4], port: u16) -> Self {
        Self {
            addr: Addr::V4(ip),
            port,
        }
    }

    pub fn v6(ip: [u8; 16], port: u16) -> Self {
        Self {
            addr: Addr::V6(ip),
            port,
        }
    }
}

fn ip_step(src: &Endpoint, dst: &Endpoint) -> PacketBuilderStep<IpHeaders> {
    let eth = PacketBuilder::ethernet2(SRC_MAC, DST_MAC);
    match (src.addr, dst.addr) {
        (Addr::V4(s), Addr::V4(d)) => eth.ipv4(s, d, 64),
        (Addr::V6(s), Addr::V6(d)) => eth.ipv6(s, d, 64),
        _ => panic!("endpoints must share an address family"),
    }
}

pub fn ethernet_frame(data: Vec<u8>) -> Frame {
    Frame::ethernet(data)
}

/// Ethernet TCP frame padded with payload to exactly `total_len` bytes
/// (or the bare headers when `total_len` is smaller).
pub fn tcp_frame(src: Endpoint, dst: Endpoint, total_len: usize) -> Frame {
    let builder = ip_step(&src, &dst).tcp(src.port, dst.port, 1, 65535);
    let payload = vec![0u8; total_len.saturating_sub(builder.size(0))];
    let mut out = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut out, &payload).expect("tcp frame builds");
    Frame::ethernet(out)
}

pub fn udp_frame(src: Endpoint, dst: Endpoint, total_len: usize) -> Frame {
    let builder = ip_step(&src, &dst).udp(src.port, dst.port);
    let payload = vec![0u8; total_len.saturating_sub(builder.size(0))];
    let mut out = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut out, &payload).expect("udp frame builds");
    Frame::ethernet(out)
}

pub fn icmp_frame(src: [u8; 4], dst: [u8; 4]) -> Frame {
    let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
        .ipv4(src, dst, 64)
        .icmpv4_echo_request(1, 1);
    let mut out = Vec::new();
    builder.write(&mut out, &[0u8; 8]).expect("icmp frame builds");
    Frame::ethernet(out)
}

/// Replays a fixed script of reads, then idles with read timeouts.
pub struct ScriptedSource {
    script: VecDeque<Result<Frame, CaptureError>>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<Frame, CaptureError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self::new(frames.into_iter().map(Ok))
    }

    /// Flag set once the source has been dropped, i.e. the device closed.
    pub fn dropped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dropped)
    }
}

impl PacketSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.script.pop_front() {
            Some(item) => item.map(Some),
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}
