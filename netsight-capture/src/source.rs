//! Live packet sources and device enumeration.
//!
//! libpcap reads block, so a [`PacketSource`] is driven from a blocking
//! thread. The read timeout bounds how long that thread can go without
//! checking for cancellation.

use std::net::IpAddr;

use bytes::Bytes;
use pcap::{Active, Capture, Device};
use serde::Serialize;
use tracing::{debug, info};

use netsight_config::CaptureConfig;

use crate::error::CaptureError;
use crate::packet::{Frame, LinkType};

/// Blocking frame supplier owned by a capture session.
pub trait PacketSource: Send + 'static {
    /// Returns the next frame, `Ok(None)` when the read timed out, or an
    /// error when the device can no longer be read.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Open pcap handle. Dropping it closes the device.
pub struct PcapSource {
    cap: Capture<Active>,
    link: LinkType,
}

impl PcapSource {
    pub fn open(interface: &str, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let open_err = |source| CaptureError::Open {
            interface: interface.to_string(),
            source,
        };

        let cap = Capture::from_device(interface)
            .map_err(open_err)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.read_timeout_ms as i32)
            .immediate_mode(true)
            .open()
            .map_err(open_err)?;

        let link = LinkType::from_dlt(cap.get_datalink().0);
        info!(interface, ?link, "Opened capture device");
        Ok(Self { cap, link })
    }
}

impl PacketSource for PcapSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(Some(Frame::new(
                Bytes::copy_from_slice(packet.data),
                self.link,
            ))),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(CaptureError::Device(e)),
        }
    }
}

/// Capture device as reported by libpcap.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub description: Option<String>,
    pub addresses: Vec<IpAddr>,
}

fn is_loopback(device: &Device) -> bool {
    device.flags.is_loopback() || device.name == "lo" || device.name == "lo0"
}

/// Non-loopback capture devices.
pub fn devices() -> Result<Vec<DeviceInfo>, CaptureError> {
    let devices = Device::list().map_err(CaptureError::DeviceList)?;
    Ok(devices
        .into_iter()
        .filter(|d| !is_loopback(d))
        .map(|d| DeviceInfo {
            addresses: d.addresses.iter().map(|a| a.addr).collect(),
            name: d.name,
            description: d.desc,
        })
        .collect())
}

/// Resolves the interface to capture on. An empty request picks the first
/// non-loopback device that has at least one address.
pub fn select_interface(requested: &str) -> Result<String, CaptureError> {
    if !requested.is_empty() {
        return Ok(requested.to_string());
    }

    let devices = Device::list().map_err(CaptureError::DeviceList)?;
    let chosen = devices
        .into_iter()
        .find(|d| !d.addresses.is_empty() && !is_loopback(d))
        .ok_or(CaptureError::NoDevice)?;
    debug!(interface = %chosen.name, "Auto-selected capture device");
    Ok(chosen.name)
}
