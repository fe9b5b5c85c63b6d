//! Typed command wrappers over the session's request primitive
//!
//! Mirrors the command set the bridge exposes besides sensor traffic:
//! version and time queries, the registered-apps list, app deregistration,
//! and remote-method invocations.

use crate::error::{Error, Result};
use crate::protocol::{OpCode, RmiCommand};
use crate::session::{confirm_ok, Session};

/// Bridge firmware/version information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Packed gateway firmware version
    pub gateway_version: u32,
    /// Bridge serial string
    pub serial: String,
}

/// One entry of the bridge's registered-apps list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredApp {
    pub uuid: [u8; 16],
    pub name: String,
}

impl Session {
    /// Query bridge version and serial
    pub fn cmd_version_request(&self) -> Result<VersionInfo> {
        let payload = self.request(OpCode::VersionRequest, &[])?;
        if payload.len() < 4 {
            return Err(Error::InvalidResponse(
                "version confirmation too short".to_string(),
            ));
        }
        let gateway_version =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let serial = String::from_utf8_lossy(&payload[4..]).into_owned();
        Ok(VersionInfo {
            gateway_version,
            serial,
        })
    }

    /// Query the bridge's clock (seconds since its epoch)
    pub fn cmd_time_request(&self) -> Result<u32> {
        let payload = self.request(OpCode::TimeRequest, &[])?;
        if payload.len() < 4 {
            return Err(Error::InvalidResponse(
                "time confirmation too short".to_string(),
            ));
        }
        Ok(u32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]))
    }

    /// List the client apps registered on the bridge
    pub fn cmd_list_registered_apps(&self) -> Result<Vec<RegisteredApp>> {
        let payload = self.request(OpCode::ListAppsRequest, &[])?;
        let Some((&count, mut rest)) = payload.split_first() else {
            return Err(Error::InvalidResponse(
                "empty registered-apps confirmation".to_string(),
            ));
        };

        let mut apps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if rest.len() < 17 {
                return Err(Error::InvalidResponse(
                    "truncated registered-apps entry".to_string(),
                ));
            }
            let mut uuid = [0u8; 16];
            uuid.copy_from_slice(&rest[..16]);
            let name_len = rest[16] as usize;
            if rest.len() < 17 + name_len {
                return Err(Error::InvalidResponse(
                    "truncated registered-apps name".to_string(),
                ));
            }
            let name = String::from_utf8_lossy(&rest[17..17 + name_len]).into_owned();
            apps.push(RegisteredApp { uuid, name });
            rest = &rest[17 + name_len..];
        }
        Ok(apps)
    }

    /// Remove a registered app by uuid
    pub fn cmd_deregister_app(&self, uuid: [u8; 16]) -> Result<()> {
        let payload = self.request(OpCode::DeregisterRequest, &uuid)?;
        confirm_ok(&payload)
    }

    /// Execute a remote-method invocation on the unit
    ///
    /// Returns any data bytes the node attached to its confirmation.
    pub fn cmd_rmi_request(&self, cmd: &RmiCommand) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(1 + cmd.message().len());
        payload.push(cmd.node_id());
        payload.extend_from_slice(cmd.message());

        let response = self.request(OpCode::RmiRequest, &payload)?;
        confirm_ok(&response)?;
        Ok(response[1..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::boost_start;
    use crate::session::SessionOptions;
    use crate::testutil::{
        fake_bridge, recording_callback, test_bridge_identity, test_local, FAKE_SERIAL,
        FAKE_TIME, FAKE_VERSION,
    };
    use crate::transport::MockTransport;

    fn connected() -> (Session, MockTransport) {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(1234, false));
        let (callback, _) = recording_callback();
        let session = Session::connect_with(
            Box::new(mock.clone()),
            test_bridge_identity("10.0.0.5:56747"),
            test_local(),
            1234,
            true,
            callback,
            SessionOptions::default(),
        )
        .unwrap();
        (session, mock)
    }

    #[test]
    fn test_version_request() {
        let (mut session, _mock) = connected();
        let version = session.cmd_version_request().unwrap();
        assert_eq!(version.gateway_version, FAKE_VERSION);
        assert_eq!(version.serial, FAKE_SERIAL);
        session.disconnect();
    }

    #[test]
    fn test_time_request() {
        let (mut session, _mock) = connected();
        assert_eq!(session.cmd_time_request().unwrap(), FAKE_TIME);
        session.disconnect();
    }

    #[test]
    fn test_list_registered_apps() {
        let (mut session, _mock) = connected();
        let apps = session.cmd_list_registered_apps().unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].uuid, [0x11; 16]);
        assert_eq!(apps[0].name, "app-one");
        assert_eq!(apps[1].name, "app-two");
        session.disconnect();
    }

    #[test]
    fn test_deregister_app() {
        let (mut session, _mock) = connected();
        session.cmd_deregister_app([0x11; 16]).unwrap();
        session.disconnect();
    }

    #[test]
    fn test_rmi_request_sends_node_and_message() {
        let (mut session, mock) = connected();
        mock.clear_written();

        let cmd = boost_start(600).unwrap();
        let data = session.cmd_rmi_request(&cmd).unwrap();
        assert!(data.is_empty());

        // The wire payload carries the node id followed by the message
        let written = mock.get_written();
        let mut decoder = crate::protocol::FrameDecoder::new();
        decoder.feed(&written);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.op, OpCode::RmiRequest);
        assert_eq!(frame.payload[0], cmd.node_id());
        assert_eq!(&frame.payload[1..], cmd.message());

        session.disconnect();
    }
}
