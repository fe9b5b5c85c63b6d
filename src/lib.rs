//! Vayulink - client library for the ventilation bridge protocol
//!
//! This library talks to a network-attached ventilation controller ("the
//! bridge"): it discovers the bridge on the local network, pairs with it
//! using a PIN, subscribes to telemetry sensors, receives asynchronous push
//! updates, and issues remote-method commands such as a timed boost.
//!
//! ## Protocol Architecture
//!
//! - **UDP (port 56747)**: discovery probe/reply
//! - **TCP (port 56747)**: persistent session carrying length-prefixed
//!   frames; requests are correlated with responses by id, sensor updates
//!   arrive as unsolicited pushes
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use vayulink::discovery::discover_at_address;
//! use vayulink::{LocalIdentity, Session, SessionOptions};
//!
//! # fn main() -> vayulink::Result<()> {
//! let bridge = discover_at_address("10.0.0.5:56747".parse().unwrap(), Duration::from_secs(2))?
//!     .ok_or(vayulink::Error::DiscoveryFailed)?;
//!
//! let local = LocalIdentity::new([0u8; 16], "my-client");
//! let session = Session::connect(
//!     bridge,
//!     local,
//!     1234,
//!     true,
//!     Box::new(|sensor, value| println!("{} = {}", sensor.name, value)),
//!     SessionOptions::default(),
//! )?;
//!
//! session.subscribe(vayulink::sensors::SENSOR_FAN_SPEED_MODE)?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod sensors;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use commands::{RegisteredApp, VersionInfo};
pub use discovery::{BridgeIdentity, BRIDGE_PORT};
pub use error::{Error, Result};
pub use session::{LocalIdentity, Session, SessionOptions, SessionState};
