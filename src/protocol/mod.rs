//! Bridge protocol wire layer
//!
//! # TCP Protocol Specification
//!
//! Every message exchanged with the bridge uses a length-prefixed frame:
//!
//! ```text
//! ┌──────────────────┬───────────┬────────────────────┬────────────────────┐
//! │ Length (4 bytes) │ Op (1)    │ Request id (4)     │ Payload (variable) │
//! │ Big-endian u32   │ tag byte  │ Big-endian u32     │ per-operation      │
//! └──────────────────┴───────────┴────────────────────┴────────────────────┘
//! ```
//!
//! - **Length field**: covers everything after the prefix (op + request id +
//!   payload), so `length == 5 + payload.len()`
//! - **Request id**: non-zero and monotonically increasing for requests; a
//!   confirmation echoes the id of the request it answers; pushed
//!   notifications carry id `0`
//! - **Maximum frame size**: 1 MiB
//! - **Byte order**: network byte order (big-endian) throughout, including
//!   RMI parameters and notification values

mod frame;
mod rmi;

pub use frame::{encode_frame, Frame, FrameDecoder, OpCode, MAX_FRAME_SIZE};
pub use rmi::{
    boost_end, boost_start, build_rmi, fan_mode, FanMode, RmiCommand, RMI_NODE_UNIT,
    RMI_TERMINATOR,
};
