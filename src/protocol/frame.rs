//! Frame codec for the bridge's length-prefixed stream
//!
//! This module provides:
//! - `OpCode`: operation tags with request/confirm pairing
//! - `encode_frame`: serialize one frame
//! - `FrameDecoder`: accumulating parser that tolerates partial reads
//!
//! The decoder never blocks: callers feed whatever bytes the transport
//! produced and poll `next_frame()`, which returns `Ok(None)` until a
//! complete frame has accumulated.

use crate::error::{Error, Result};

/// Maximum accepted frame body size (sanity cap against garbage lengths)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame header size after the length prefix: op tag (1) + request id (4)
const FRAME_HEADER_SIZE: usize = 5;

/// Operation tags carried in the frame header
///
/// Requests use odd tags, their confirmations the following even tag.
/// `Notification` is push-only and never correlated with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    RegisterRequest = 0x01,
    RegisterConfirm = 0x02,
    CloseRequest = 0x03,
    CloseConfirm = 0x04,
    ListAppsRequest = 0x05,
    ListAppsConfirm = 0x06,
    DeregisterRequest = 0x07,
    DeregisterConfirm = 0x08,
    VersionRequest = 0x09,
    VersionConfirm = 0x0A,
    TimeRequest = 0x0B,
    TimeConfirm = 0x0C,
    KeepAliveRequest = 0x0D,
    KeepAliveConfirm = 0x0E,
    RmiRequest = 0x0F,
    RmiConfirm = 0x10,
    SubscribeRequest = 0x11,
    SubscribeConfirm = 0x12,
    UnsubscribeRequest = 0x13,
    UnsubscribeConfirm = 0x14,
    Notification = 0x20,
}

impl OpCode {
    /// Decode a tag byte
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::RegisterRequest),
            0x02 => Some(Self::RegisterConfirm),
            0x03 => Some(Self::CloseRequest),
            0x04 => Some(Self::CloseConfirm),
            0x05 => Some(Self::ListAppsRequest),
            0x06 => Some(Self::ListAppsConfirm),
            0x07 => Some(Self::DeregisterRequest),
            0x08 => Some(Self::DeregisterConfirm),
            0x09 => Some(Self::VersionRequest),
            0x0A => Some(Self::VersionConfirm),
            0x0B => Some(Self::TimeRequest),
            0x0C => Some(Self::TimeConfirm),
            0x0D => Some(Self::KeepAliveRequest),
            0x0E => Some(Self::KeepAliveConfirm),
            0x0F => Some(Self::RmiRequest),
            0x10 => Some(Self::RmiConfirm),
            0x11 => Some(Self::SubscribeRequest),
            0x12 => Some(Self::SubscribeConfirm),
            0x13 => Some(Self::UnsubscribeRequest),
            0x14 => Some(Self::UnsubscribeConfirm),
            0x20 => Some(Self::Notification),
            _ => None,
        }
    }

    /// Confirmation tag answering this request tag, if any
    pub fn confirm(self) -> Option<Self> {
        match self {
            Self::RegisterRequest => Some(Self::RegisterConfirm),
            Self::CloseRequest => Some(Self::CloseConfirm),
            Self::ListAppsRequest => Some(Self::ListAppsConfirm),
            Self::DeregisterRequest => Some(Self::DeregisterConfirm),
            Self::VersionRequest => Some(Self::VersionConfirm),
            Self::TimeRequest => Some(Self::TimeConfirm),
            Self::KeepAliveRequest => Some(Self::KeepAliveConfirm),
            Self::RmiRequest => Some(Self::RmiConfirm),
            Self::SubscribeRequest => Some(Self::SubscribeConfirm),
            Self::UnsubscribeRequest => Some(Self::UnsubscribeConfirm),
            _ => None,
        }
    }
}

/// Parsed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub op: OpCode,
    /// Zero for pushed notifications
    pub request_id: u32,
    pub payload: Vec<u8>,
}

/// Serialize one frame: `[len u32 BE][op u8][request_id u32 BE][payload]`
pub fn encode_frame(op: OpCode, request_id: u32, payload: &[u8]) -> Vec<u8> {
    let body_len = FRAME_HEADER_SIZE + payload.len();
    let mut buf = Vec::with_capacity(4 + body_len);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    buf.push(op as u8);
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Accumulating frame parser for a streaming transport
///
/// Feed raw bytes as they arrive, then drain complete frames:
///
/// ```ignore
/// decoder.feed(&chunk);
/// while let Some(frame) = decoder.next_frame()? {
///     handle(frame);
/// }
/// ```
///
/// A corrupt frame (unknown tag, inconsistent length) is an error; the
/// session treats it as a transport failure and tears the connection down,
/// so the decoder makes no attempt to resynchronize.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append bytes received from the transport
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Try to parse the next complete frame
    ///
    /// Returns `Ok(None)` while the buffered data is still incomplete.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }

        let body_len =
            u32::from_be_bytes([self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]])
                as usize;

        if body_len < FRAME_HEADER_SIZE {
            return Err(Error::CorruptFrame(format!(
                "length {} shorter than frame header",
                body_len
            )));
        }
        if body_len > MAX_FRAME_SIZE {
            return Err(Error::CorruptFrame(format!(
                "frame too large: {} bytes",
                body_len
            )));
        }

        if self.buffer.len() < 4 + body_len {
            return Ok(None);
        }

        let tag = self.buffer[4];
        let Some(op) = OpCode::from_u8(tag) else {
            return Err(Error::CorruptFrame(format!(
                "unknown operation tag {:#04x}",
                tag
            )));
        };

        let request_id = u32::from_be_bytes([
            self.buffer[5],
            self.buffer[6],
            self.buffer[7],
            self.buffer[8],
        ]);
        let payload = self.buffer[4 + FRAME_HEADER_SIZE..4 + body_len].to_vec();
        self.buffer.drain(..4 + body_len);

        Ok(Some(Frame {
            op,
            request_id,
            payload,
        }))
    }

    /// Bytes currently buffered (for diagnostics)
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
