//! A captured frame together with the link layer it was read from.

use bytes::Bytes;

/// Link layers the classifier knows how to peel off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    /// BSD loopback: 4-byte address family header.
    Null,
    /// Bare IPv4/IPv6 with no link header.
    Raw,
    /// Linux cooked capture v1 (`any` device): 16-byte header.
    LinuxSll,
    Unsupported(i32),
}

impl LinkType {
    /// Maps a pcap `DLT_*`/`LINKTYPE_*` value.
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkType::Ethernet,
            0 | 108 => LinkType::Null,
            12 | 14 | 101 | 228 | 229 => LinkType::Raw,
            113 => LinkType::LinuxSll,
            other => LinkType::Unsupported(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,
    pub link: LinkType,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, link: LinkType) -> Self {
        Frame {
            data: data.into(),
            link,
        }
    }

    pub fn ethernet(data: impl Into<Bytes>) -> Self {
        Self::new(data, LinkType::Ethernet)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
