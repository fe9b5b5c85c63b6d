//! Remote-method-invocation command encoder
//!
//! RMI commands tell the ventilation unit to change an operating parameter.
//! The serialized message is a fixed layout:
//!
//! ```text
//! [sub-command bytes] [param 1 .. param N, big-endian, declared widths] [0x03]
//! ```
//!
//! addressed at a node id carried next to the message. Every parameter is
//! emitted at its full declared width, left-padded with zero bytes; a value
//! that does not fit its width is rejected before anything is sent.

use crate::error::{Error, Result};

/// Terminator byte closing every RMI message
pub const RMI_TERMINATOR: u8 = 0x03;

/// Node id of the ventilation unit itself
pub const RMI_NODE_UNIT: u8 = 0x01;

/// Sub-command prefix: start boost mode for a duration
const SUBCMD_BOOST_START: [u8; 4] = [0x84, 0x15, 0x01, 0x06];

/// Sub-command prefix: end boost mode immediately
const SUBCMD_BOOST_END: [u8; 4] = [0x84, 0x15, 0x01, 0x07];

/// Sub-command prefix: select a fan preset
const SUBCMD_FAN_MODE: [u8; 4] = [0x84, 0x15, 0x01, 0x01];

/// Width of the boost duration field in bytes
const BOOST_DURATION_WIDTH: u8 = 6;

/// A built RMI command, ready to send through the command façade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmiCommand {
    node_id: u8,
    message: Vec<u8>,
}

impl RmiCommand {
    /// Destination node id
    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Serialized message bytes (sub-command, parameters, terminator)
    pub fn message(&self) -> &[u8] {
        &self.message
    }
}

/// Build an RMI command from validated parameters
///
/// Each `(value, width_bytes)` pair is emitted big-endian at exactly
/// `width_bytes` bytes. Values that do not fit fail with an encoding error;
/// truncation never happens.
pub fn build_rmi(node_id: u8, sub_command: &[u8], params: &[(u64, u8)]) -> Result<RmiCommand> {
    let mut message = Vec::with_capacity(sub_command.len() + params.len() * 4 + 1);
    message.extend_from_slice(sub_command);

    for &(value, width) in params {
        if width == 0 || width > 8 {
            return Err(Error::Encoding(format!(
                "invalid parameter width: {} bytes",
                width
            )));
        }
        if width < 8 && value >> (8 * u32::from(width)) != 0 {
            return Err(Error::Encoding(format!(
                "value {} does not fit in {} byte(s)",
                value, width
            )));
        }
        let be = value.to_be_bytes();
        message.extend_from_slice(&be[8 - width as usize..]);
    }

    message.push(RMI_TERMINATOR);
    Ok(RmiCommand { node_id, message })
}

/// Start boost mode for the given duration in seconds
pub fn boost_start(duration_secs: u64) -> Result<RmiCommand> {
    build_rmi(
        RMI_NODE_UNIT,
        &SUBCMD_BOOST_START,
        &[(duration_secs, BOOST_DURATION_WIDTH), (0, 2)],
    )
}

/// End boost mode immediately
pub fn boost_end() -> Result<RmiCommand> {
    build_rmi(RMI_NODE_UNIT, &SUBCMD_BOOST_END, &[])
}

/// Fan speed presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FanMode {
    Away = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Select a fan preset
pub fn fan_mode(mode: FanMode) -> Result<RmiCommand> {
    build_rmi(RMI_NODE_UNIT, &SUBCMD_FAN_MODE, &[(mode as u64, 1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_widths() {
        let cmd = build_rmi(0x01, &[0x10], &[(0x0102, 2), (0xFF, 1), (7, 4)]).unwrap();
        assert_eq!(
            cmd.message(),
            &[0x10, 0x01, 0x02, 0xFF, 0x00, 0x00, 0x00, 0x07, RMI_TERMINATOR]
        );
        assert_eq!(cmd.node_id(), 0x01);
    }

    #[test]
    fn test_value_at_width_boundary() {
        // Largest value per width encodes; one more is rejected
        assert!(build_rmi(1, &[], &[(0xFF, 1)]).is_ok());
        assert!(build_rmi(1, &[], &[(0x100, 1)]).is_err());
        assert!(build_rmi(1, &[], &[(0xFFFF, 2)]).is_ok());
        assert!(build_rmi(1, &[], &[(0x1_0000, 2)]).is_err());
        assert!(build_rmi(1, &[], &[(u64::MAX, 8)]).is_ok());
    }

    #[test]
    fn test_out_of_range_never_truncates() {
        let err = build_rmi(1, &[0x84], &[(0x1234, 1)]).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_invalid_width_rejected() {
        assert!(build_rmi(1, &[], &[(0, 0)]).is_err());
        assert!(build_rmi(1, &[], &[(0, 9)]).is_err());
    }

    #[test]
    fn test_boost_600_seconds() {
        // 600 = 0x0258, padded to the 6-byte duration field
        let cmd = boost_start(600).unwrap();
        assert_eq!(
            cmd.message(),
            &[
                0x84, 0x15, 0x01, 0x06, // sub-command
                0x00, 0x00, 0x00, 0x00, 0x02, 0x58, // duration
                0x00, 0x00, // reserved
                RMI_TERMINATOR,
            ]
        );
        assert_eq!(cmd.node_id(), RMI_NODE_UNIT);
    }

    #[test]
    fn test_boost_duration_with_odd_hex_digit_count() {
        // 280 = 0x118: three hex digits, the case a naive two-character
        // hex-chunking encoder mangles. Must zero-pad to the full field.
        let cmd = boost_start(280).unwrap();
        assert_eq!(
            cmd.message(),
            &[
                0x84, 0x15, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x01, 0x18, 0x00, 0x00,
                RMI_TERMINATOR,
            ]
        );

        // 4095 = 0xFFF, same shape at a different magnitude
        let cmd = boost_start(4095).unwrap();
        assert_eq!(cmd.message()[4..10], [0x00, 0x00, 0x00, 0x00, 0x0F, 0xFF]);
    }

    #[test]
    fn test_boost_duration_out_of_range() {
        // 2^48 does not fit the 6-byte duration field
        assert!(boost_start(1 << 48).is_err());
        assert!(boost_start((1 << 48) - 1).is_ok());
    }

    #[test]
    fn test_encoded_params_decode_back_exactly() {
        use crate::sensors::decode_value;

        let cases: &[(u64, u8)] = &[
            (0, 1),
            (0xFF, 1),
            (280, 2),
            (600, 2),
            (0x118, 6),
            (u32::MAX as u64, 4),
        ];
        for &(value, width) in cases {
            let cmd = build_rmi(1, &[], &[(value, width)]).unwrap();
            let raw = &cmd.message()[..width as usize];
            assert_eq!(decode_value(raw, width, false), Some(value as i64));
        }
    }

    #[test]
    fn test_fan_mode_messages() {
        let cmd = fan_mode(FanMode::High).unwrap();
        assert_eq!(cmd.message(), &[0x84, 0x15, 0x01, 0x01, 0x03, RMI_TERMINATOR]);
        let cmd = fan_mode(FanMode::Away).unwrap();
        assert_eq!(cmd.message(), &[0x84, 0x15, 0x01, 0x01, 0x00, RMI_TERMINATOR]);
    }
}
