//! Bridge discovery over UDP
//!
//! The bridge answers a two-byte probe on its published port with a reply
//! carrying its 16-byte unique id. Two discovery modes exist:
//!
//! - [`discover_broadcast`]: probe the local network and collect every
//!   bridge that answers before the timeout
//! - [`discover_at_address`]: probe one known host directly
//!
//! No reply is not an error; broadcast discovery returns an empty list and
//! direct discovery returns `None`.

use crate::error::Result;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

/// TCP and UDP port published by the bridge
pub const BRIDGE_PORT: u16 = 56747;

/// Discovery probe datagram
pub const DISCOVERY_PROBE: [u8; 2] = [0x0A, 0x00];

/// First byte of a valid discovery reply
const DISCOVERY_REPLY_TAG: u8 = 0x0D;

/// Reply layout: tag (1) + uuid (16)
const DISCOVERY_REPLY_LEN: usize = 17;

/// Socket read timeout while collecting replies
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// A discovered bridge: where it lives and who it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeIdentity {
    /// Address of the bridge's stream endpoint
    pub address: SocketAddr,
    /// Unique 16-byte bridge id
    pub uuid: [u8; 16],
}

impl BridgeIdentity {
    pub fn new(address: SocketAddr, uuid: [u8; 16]) -> Self {
        Self { address, uuid }
    }

    /// Lowercase hex rendering of the bridge uuid
    pub fn uuid_hex(&self) -> String {
        self.uuid.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Probe the local network and collect every bridge that answers
///
/// Returns an empty list when nothing answered within the timeout.
pub fn discover_broadcast(timeout: Duration) -> Result<Vec<BridgeIdentity>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_broadcast(true)?;
    socket.set_read_timeout(Some(POLL_TIMEOUT))?;

    log::debug!("Broadcasting discovery probe on port {}", BRIDGE_PORT);
    socket.send_to(&DISCOVERY_PROBE, (Ipv4Addr::BROADCAST, BRIDGE_PORT))?;

    let mut bridges: Vec<BridgeIdentity> = Vec::new();
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 64];

    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                if let Some(bridge) = parse_reply(&buf[..n], src) {
                    if bridges.iter().all(|b| b.uuid != bridge.uuid) {
                        log::info!(
                            "Bridge found: {} ({})",
                            bridge.uuid_hex(),
                            bridge.address
                        );
                        bridges.push(bridge);
                    }
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::ConnectionRefused => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(bridges)
}

/// Probe one host directly, returning zero or one bridge
pub fn discover_at_address(addr: SocketAddr, timeout: Duration) -> Result<Option<BridgeIdentity>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_read_timeout(Some(POLL_TIMEOUT))?;

    log::debug!("Sending discovery probe to {}", addr);
    socket.send_to(&DISCOVERY_PROBE, addr)?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 64];

    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                if let Some(bridge) = parse_reply(&buf[..n], src) {
                    log::info!("Bridge found: {} ({})", bridge.uuid_hex(), bridge.address);
                    return Ok(Some(bridge));
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::ConnectionRefused => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(None)
}

/// Parse a discovery reply; malformed replies are dropped
fn parse_reply(data: &[u8], src: SocketAddr) -> Option<BridgeIdentity> {
    if data.len() < DISCOVERY_REPLY_LEN || data[0] != DISCOVERY_REPLY_TAG {
        log::debug!("Ignoring malformed discovery reply from {}", src);
        return None;
    }

    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(&data[1..17]);

    // The bridge replies from an ephemeral port; the stream endpoint is
    // always the published port.
    Some(BridgeIdentity::new(
        SocketAddr::new(src.ip(), BRIDGE_PORT),
        uuid,
    ))
}
