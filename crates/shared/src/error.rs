use thiserror::Error;

use crate::domain::Side;

/// The zone color source could not produce a usable snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source request failed: {0}")]
    Transport(String),
    #[error("source answered with HTTP status {0}")]
    Status(u16),
    #[error("malformed source response: {0}")]
    Malformed(String),
    #[error("topology mismatch on {side} side: expected {expected} zones, got {actual}")]
    TopologyMismatch {
        side: Side,
        expected: usize,
        actual: usize,
    },
}

/// Zone data or LED geometry inconsistent with the configured topology.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidInput {
    #[error("strip '{strip}' needs zones on the {side} side but none were provided")]
    MissingZones { strip: String, side: Side },
    #[error("strip '{strip}' reads {side} zone {zone} but only {available} zones exist")]
    ZoneOutOfRange {
        strip: String,
        side: Side,
        zone: usize,
        available: usize,
    },
    #[error("strip '{strip}' reaches LED {index} but at most {max} LEDs are supported")]
    TooManyLeds {
        strip: String,
        index: usize,
        max: usize,
    },
    #[error("strip '{strip}' overlaps another strip at LED {index}")]
    OverlappingStrip { strip: String, index: usize },
    #[error("LED topology has no strips")]
    EmptyTopology,
    #[error("frame holds {actual} LEDs but the topology needs {expected}")]
    FrameTooShort { expected: usize, actual: usize },
    #[error("brightness {0} is outside 0.0..=1.0")]
    Brightness(f64),
}

/// The LED sink refused or failed to deliver a packet.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("failed to resolve LED controller address {target}: {source}")]
    Resolve {
        target: String,
        source: std::io::Error,
    },
    #[error("LED controller address {0} resolved to nothing")]
    NoAddress(String),
    #[error("failed to open UDP socket: {0}")]
    Bind(std::io::Error),
    #[error("failed to send {len} bytes to LED controller: {source}")]
    Send { len: usize, source: std::io::Error },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("instance has been destroyed")]
    Destroyed,
    #[error("sync loop task aborted")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error(transparent)]
    Transmit(#[from] TransmitError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
