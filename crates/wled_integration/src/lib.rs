//! WLED realtime UDP output: packet framing plus a lazily opened socket.

use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    domain::LedColor,
    error::{LifecycleError, SyncError, TransmitError},
};
use tokio::{
    net::{lookup_host, UdpSocket},
    sync::Mutex,
};
use tracing::{info, trace};

pub const DEFAULT_PORT: u16 = 21324;
/// Seconds WLED keeps realtime data before reverting to its own effects.
pub const DEFAULT_TIMEOUT_MULTIPLIER: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WledProtocol {
    /// 3 bytes per LED.
    Drgb,
    /// 4 bytes per LED, white last.
    #[default]
    Drgbw,
}

impl WledProtocol {
    pub fn id(self) -> u8 {
        match self {
            WledProtocol::Drgb => 2,
            WledProtocol::Drgbw => 3,
        }
    }

    pub fn has_white(self) -> bool {
        matches!(self, WledProtocol::Drgbw)
    }

    pub fn bytes_per_led(self) -> usize {
        if self.has_white() {
            4
        } else {
            3
        }
    }

    /// LEDs addressable by one realtime packet.
    pub fn max_leds(self) -> usize {
        match self {
            WledProtocol::Drgb => 490,
            WledProtocol::Drgbw => 367,
        }
    }
}

impl fmt::Display for WledProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WledProtocol::Drgb => f.write_str("drgb"),
            WledProtocol::Drgbw => f.write_str("drgbw"),
        }
    }
}

impl FromStr for WledProtocol {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drgb" | "2" => Ok(WledProtocol::Drgb),
            "drgbw" | "3" => Ok(WledProtocol::Drgbw),
            other => Err(format!(
                "unknown WLED protocol '{other}', expected 'drgb' or 'drgbw'"
            )),
        }
    }
}

/// `[protocol, timeout, R0, G0, B0, (W0), R1, ...]` in LED index order.
pub fn encode_frame(pixels: &[LedColor], protocol: WledProtocol, timeout: u8) -> Vec<u8> {
    let mut packet = Vec::with_capacity(2 + pixels.len() * protocol.bytes_per_led());
    packet.push(protocol.id());
    packet.push(timeout);
    for pixel in pixels {
        packet.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
        if protocol.has_white() {
            packet.push(pixel.w);
        }
    }
    packet
}

pub fn encode_color(color: LedColor, protocol: WledProtocol, timeout: u8) -> Vec<u8> {
    encode_frame(&[color], protocol, timeout)
}

#[async_trait]
pub trait LedSink: Send + Sync {
    /// Sends one encoded packet. Fails with `LifecycleError` once closed.
    async fn transmit(&self, payload: &[u8]) -> Result<(), SyncError>;
    /// Releases the transport. Later transmits fail.
    async fn close(&self);
}

#[derive(Default)]
struct SocketState {
    socket: Option<UdpSocket>,
    closed: bool,
}

/// UDP sink for one WLED controller. The socket is opened on the first
/// transmit and kept until [`LedSink::close`].
pub struct WledUdpSink {
    target: String,
    state: Mutex<SocketState>,
}

impl WledUdpSink {
    pub fn new(host: &str, port: u16) -> Self {
        let target = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        Self {
            target,
            state: Mutex::new(SocketState::default()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.socket.is_some()
    }

    async fn open(&self) -> Result<UdpSocket, TransmitError> {
        let addr = lookup_host(&self.target)
            .await
            .map_err(|source| TransmitError::Resolve {
                target: self.target.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| TransmitError::NoAddress(self.target.clone()))?;

        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(TransmitError::Bind)?;
        socket.connect(addr).await.map_err(TransmitError::Bind)?;
        info!(%addr, "wled: udp socket opened");
        Ok(socket)
    }
}

#[async_trait]
impl LedSink for WledUdpSink {
    async fn transmit(&self, payload: &[u8]) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LifecycleError::Destroyed.into());
        }

        let socket = match state.socket.take() {
            Some(socket) => socket,
            None => self.open().await?,
        };
        let sent = socket.send(payload).await;
        state.socket = Some(socket);

        sent.map_err(|source| TransmitError::Send {
            len: payload.len(),
            source,
        })?;
        trace!(bytes = payload.len(), "wled: packet sent");
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        if state.socket.take().is_some() {
            info!(controller = %self.target, "wled: udp socket released");
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
