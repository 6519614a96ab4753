use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to list capture devices: {0}")]
    DeviceList(#[source] pcap::Error),

    #[error("No capture device with an address found")]
    NoDevice,

    #[error("Failed to open device {interface}: {source}")]
    Open {
        interface: String,
        #[source]
        source: pcap::Error,
    },

    #[error("Capture device error: {0}")]
    Device(#[source] pcap::Error),

    #[error("Capture session already closed")]
    Closed,

    #[error("Capture reader stopped unexpectedly")]
    ReaderGone,

    #[error("Capture task failed: {0}")]
    Task(String),
}
