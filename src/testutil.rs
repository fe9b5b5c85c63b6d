//! Shared helpers for unit tests: a scripted fake bridge and a recording
//! sensor callback.

use crate::discovery::BridgeIdentity;
use crate::protocol::{encode_frame, FrameDecoder, OpCode};
use crate::sensors::SensorCallback;
use crate::session::LocalIdentity;
use crate::transport::MockResponder;
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) const FAKE_VERSION: u32 = 0x0102;
pub(crate) const FAKE_SERIAL: &str = "VB-2024-0001";
pub(crate) const FAKE_TIME: u32 = 123_456;

/// Scripted bridge answering every request it recognizes
pub(crate) fn fake_bridge(pin: u32, existing_client: bool) -> MockResponder {
    fake_bridge_ignoring(pin, existing_client, &[])
}

/// Scripted bridge that stays silent for the listed operations
///
/// Timeout and correlation tests rely on an operation the bridge never
/// answers.
pub(crate) fn fake_bridge_ignoring(
    pin: u32,
    existing_client: bool,
    ignored: &'static [OpCode],
) -> MockResponder {
    let mut decoder = FrameDecoder::new();

    Box::new(move |bytes: &[u8]| {
        decoder.feed(bytes);
        let mut out = Vec::new();

        while let Ok(Some(frame)) = decoder.next_frame() {
            if ignored.contains(&frame.op) {
                continue;
            }
            let id = frame.request_id;
            match frame.op {
                OpCode::RegisterRequest => {
                    // [uuid 16][pin u32 BE][takeover u8][name...]
                    let request_pin = u32::from_be_bytes([
                        frame.payload[16],
                        frame.payload[17],
                        frame.payload[18],
                        frame.payload[19],
                    ]);
                    let takeover = frame.payload[20] != 0;
                    let code = if request_pin != pin {
                        1
                    } else if existing_client && !takeover {
                        2
                    } else {
                        0
                    };
                    out.extend(encode_frame(OpCode::RegisterConfirm, id, &[code]));
                }
                OpCode::SubscribeRequest => {
                    out.extend(encode_frame(OpCode::SubscribeConfirm, id, &[0]));
                }
                OpCode::UnsubscribeRequest => {
                    out.extend(encode_frame(OpCode::UnsubscribeConfirm, id, &[0]));
                }
                OpCode::KeepAliveRequest => {
                    out.extend(encode_frame(OpCode::KeepAliveConfirm, id, &[]));
                }
                OpCode::CloseRequest => {
                    out.extend(encode_frame(OpCode::CloseConfirm, id, &[]));
                }
                OpCode::VersionRequest => {
                    let mut payload = FAKE_VERSION.to_be_bytes().to_vec();
                    payload.extend_from_slice(FAKE_SERIAL.as_bytes());
                    out.extend(encode_frame(OpCode::VersionConfirm, id, &payload));
                }
                OpCode::TimeRequest => {
                    out.extend(encode_frame(
                        OpCode::TimeConfirm,
                        id,
                        &FAKE_TIME.to_be_bytes(),
                    ));
                }
                OpCode::ListAppsRequest => {
                    let mut payload = vec![2u8];
                    payload.extend_from_slice(&[0x11; 16]);
                    payload.push(7);
                    payload.extend_from_slice(b"app-one");
                    payload.extend_from_slice(&[0x22; 16]);
                    payload.push(7);
                    payload.extend_from_slice(b"app-two");
                    out.extend(encode_frame(OpCode::ListAppsConfirm, id, &payload));
                }
                OpCode::DeregisterRequest => {
                    out.extend(encode_frame(OpCode::DeregisterConfirm, id, &[0]));
                }
                OpCode::RmiRequest => {
                    out.extend(encode_frame(OpCode::RmiConfirm, id, &[0]));
                }
                _ => {}
            }
        }

        out
    })
}

/// Callback that records every `(sensor id, value)` it sees
pub(crate) fn recording_callback() -> (SensorCallback, Arc<Mutex<Vec<(u16, i64)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: SensorCallback = Box::new(move |spec, value| {
        sink.lock().push((spec.id, value));
    });
    (callback, seen)
}

pub(crate) fn test_bridge_identity(addr: &str) -> BridgeIdentity {
    BridgeIdentity::new(addr.parse().unwrap(), [0x42; 16])
}

pub(crate) fn test_local() -> LocalIdentity {
    let mut uuid = [0u8; 16];
    uuid[15] = 0x05;
    LocalIdentity::new(uuid, "vayulink-test")
}
