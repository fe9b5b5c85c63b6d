//! Authenticated bridge session
//!
//! The session owns the transport connection and everything that happens on
//! it: the pairing handshake, the correlated request/response table, the
//! keep-alive loop, the subscription set, and dispatch of pushed sensor
//! notifications.
//!
//! # Thread Structure
//!
//! Two threads run per active session:
//!
//! - **Read loop**: drains the transport, resolves pending requests by id,
//!   routes notifications to the sensor registry
//! - **Keep-alive loop**: issues a liveness request on a fixed interval;
//!   a missing reply is treated as connection loss
//!
//! Caller threads, the read loop and the keep-alive loop share the transport
//! and the pending-request table behind mutexes. Every blocking call is
//! bounded by a timeout; closing the session wakes any waiter with a
//! `SessionClosed` error instead of leaving it blocked.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Handshaking -> Active -> Closing -> Closed
//!              |            |
//!              +--> Error <-+   (handshake rejection / transport failure)
//! ```
//!
//! There is no automatic reconnect; after `Error` the owner discards the
//! session and decides whether to connect again.

use crate::discovery::BridgeIdentity;
use crate::error::{Error, Result};
use crate::protocol::{encode_frame, Frame, FrameDecoder, OpCode};
use crate::sensors::{sensor_spec, SensorCallback, SensorRegistry};
use crate::transport::{TcpTransport, Transport};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sleep between empty transport reads
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Keep-alive loop tick; the interval check runs at this granularity so
/// shutdown stays responsive
const KEEPALIVE_TICK: Duration = Duration::from_millis(100);

/// This client's identity towards the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Unique 16-byte client id
    pub uuid: [u8; 16],
    /// Display name shown in the bridge's registered-apps list
    pub name: String,
}

impl LocalIdentity {
    pub fn new(uuid: [u8; 16], name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport open
    Idle,
    /// Caller-driven discovery phase, before a session exists
    Discovering,
    /// Transport open, registration exchange in flight
    Handshaking,
    /// Registered; requests, subscriptions and pushes flowing
    Active,
    /// Graceful teardown in progress
    Closing,
    /// Torn down; every further call fails with `SessionClosed`
    Closed,
    /// Transport or keep-alive failure; the owner must reconnect
    Error,
}

/// Timeouts and intervals governing a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bound on connect + registration exchange
    pub handshake_timeout: Duration,
    /// Bound on every request/response round trip
    pub request_timeout: Duration,
    /// Liveness request period; must stay below the bridge's idle timeout
    pub keepalive_interval: Duration,
    /// Bound on the graceful teardown exchange
    pub disconnect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
            disconnect_timeout: Duration::from_secs(2),
        }
    }
}

/// State shared between caller threads and the two worker loops
struct Shared {
    transport: Mutex<Box<dyn Transport>>,
    /// Request id -> single-slot waiter for the matching response payload
    pending: Mutex<HashMap<u32, Sender<Vec<u8>>>>,
    state: Mutex<SessionState>,
    next_request_id: AtomicU32,
    shutdown: AtomicBool,
    registry: SensorRegistry,
    options: SessionOptions,
}

impl Shared {
    /// Send a request frame and wait for its correlated response
    ///
    /// Inserts the waiter before writing, so a response can never arrive
    /// without a registered slot. A timeout frees the slot; a closed
    /// session wakes the waiter through the dropped sender.
    fn request(&self, op: OpCode, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        self.pending.lock().insert(request_id, tx);

        let frame = encode_frame(op, request_id, payload);
        log::trace!(
            "Sending {:?} (id {}, {} payload byte(s))",
            op,
            request_id,
            payload.len()
        );

        let write_result = self.transport.lock().write_all(&frame);
        if let Err(e) = write_result {
            self.pending.lock().remove(&request_id);
            log::error!("Transport write failed: {}", e);
            self.fail();
            return Err(e);
        }

        match rx.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                self.pending.lock().remove(&request_id);
                log::warn!("Request {:?} (id {}) timed out", op, request_id);
                Err(Error::RequestTimeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::SessionClosed),
        }
    }

    /// Route one decoded frame
    fn handle_frame(&self, frame: Frame) {
        if frame.op == OpCode::Notification {
            if frame.request_id != 0 {
                log::warn!(
                    "Notification with non-zero request id {}, dropping",
                    frame.request_id
                );
                return;
            }
            if frame.payload.len() < 2 {
                log::warn!("Notification payload too short, dropping");
                return;
            }
            let sensor_id = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
            self.registry.on_notification(sensor_id, &frame.payload[2..]);
            return;
        }

        if frame.request_id == 0 {
            log::warn!("{:?} frame without request id, dropping", frame.op);
            return;
        }

        match self.pending.lock().remove(&frame.request_id) {
            Some(waiter) => {
                // A waiter that already timed out has dropped its receiver;
                // the failed send is harmless.
                let _ = waiter.send(frame.payload);
            }
            None => {
                log::warn!(
                    "{:?} response for unknown request id {}, dropping",
                    frame.op,
                    frame.request_id
                );
            }
        }
    }

    /// Transition to the terminal error state and wake every waiter
    fn fail(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Closing | SessionState::Closed => {}
                _ => *state = SessionState::Error,
            }
        }
        self.shutdown.store(true, Ordering::Relaxed);
        self.drain_pending();
    }

    /// Drop every pending waiter, waking it with `SessionClosed`
    fn drain_pending(&self) {
        self.pending.lock().clear();
    }
}

/// An authenticated session with one bridge
///
/// Created by [`Session::connect`], destroyed by [`Session::disconnect`]
/// (also run on drop). The notification callback is fixed at creation time.
pub struct Session {
    shared: Arc<Shared>,
    bridge: BridgeIdentity,
    local: LocalIdentity,
    read_thread: Option<JoinHandle<()>>,
    keepalive_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("bridge", &self.bridge)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect to a discovered bridge and run the pairing handshake
    ///
    /// # Arguments
    /// * `bridge` - Identity returned by discovery
    /// * `local` - This client's identity
    /// * `pin` - Pairing PIN registered on the bridge
    /// * `force_takeover` - Evict an already-registered client instead of
    ///   failing with `AlreadyRegistered`
    /// * `callback` - Receiver for decoded sensor notifications
    pub fn connect(
        bridge: BridgeIdentity,
        local: LocalIdentity,
        pin: u32,
        force_takeover: bool,
        callback: SensorCallback,
        options: SessionOptions,
    ) -> Result<Self> {
        let transport = TcpTransport::connect(bridge.address, options.handshake_timeout)?;
        Self::connect_with(
            Box::new(transport),
            bridge,
            local,
            pin,
            force_takeover,
            callback,
            options,
        )
    }

    /// Connect over an already-open transport (tests use a mock here)
    pub fn connect_with(
        transport: Box<dyn Transport>,
        bridge: BridgeIdentity,
        local: LocalIdentity,
        pin: u32,
        force_takeover: bool,
        callback: SensorCallback,
        options: SessionOptions,
    ) -> Result<Self> {
        log::info!(
            "Registering with bridge {} ({}) as '{}'",
            bridge.uuid_hex(),
            bridge.address,
            local.name
        );

        let shared = Arc::new(Shared {
            transport: Mutex::new(transport),
            pending: Mutex::new(HashMap::new()),
            state: Mutex::new(SessionState::Handshaking),
            next_request_id: AtomicU32::new(1),
            shutdown: AtomicBool::new(false),
            registry: SensorRegistry::new(callback),
            options,
        });

        // The read loop must run during the handshake to receive the
        // registration confirmation.
        let read_shared = Arc::clone(&shared);
        let read_thread = thread::spawn(move || read_loop(read_shared));

        let mut payload = Vec::with_capacity(21 + local.name.len());
        payload.extend_from_slice(&local.uuid);
        payload.extend_from_slice(&pin.to_be_bytes());
        payload.push(u8::from(force_takeover));
        payload.extend_from_slice(local.name.as_bytes());

        let handshake_timeout = shared.options.handshake_timeout;
        let outcome = match shared.request(OpCode::RegisterRequest, &payload, handshake_timeout) {
            Ok(response) => match response.first() {
                Some(0) => Ok(()),
                Some(1) => Err(Error::AuthenticationFailed),
                Some(2) => Err(Error::AlreadyRegistered),
                Some(&code) => Err(Error::Bridge(code)),
                None => Err(Error::InvalidResponse(
                    "empty registration confirmation".to_string(),
                )),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            log::warn!("Handshake with bridge {} failed: {}", bridge.uuid_hex(), e);
            shared.shutdown.store(true, Ordering::Relaxed);
            let _ = read_thread.join();
            // Back to Idle; dropping the transport closes the connection
            *shared.state.lock() = SessionState::Idle;
            return Err(e);
        }

        *shared.state.lock() = SessionState::Active;

        let keepalive_shared = Arc::clone(&shared);
        let keepalive_thread = thread::spawn(move || keepalive_loop(keepalive_shared));

        log::info!("Session active with bridge {}", bridge.uuid_hex());

        Ok(Session {
            shared,
            bridge,
            local,
            read_thread: Some(read_thread),
            keepalive_thread: Some(keepalive_thread),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Bridge this session talks to
    pub fn bridge(&self) -> &BridgeIdentity {
        &self.bridge
    }

    /// Identity this session registered with
    pub fn local(&self) -> &LocalIdentity {
        &self.local
    }

    /// Sorted snapshot of subscribed sensor ids
    pub fn subscriptions(&self) -> Vec<u16> {
        self.shared.registry.subscriptions()
    }

    /// Send a request and wait for the correlated response payload
    ///
    /// Fails with `RequestTimeout` when no response arrives in time (the
    /// session stays usable) and with `SessionClosed` once the session has
    /// been closed or has failed.
    pub fn request(&self, op: OpCode, payload: &[u8]) -> Result<Vec<u8>> {
        self.ensure_active()?;
        self.shared
            .request(op, payload, self.shared.options.request_timeout)
    }

    /// Subscribe to a sensor's push notifications
    pub fn subscribe(&self, sensor_id: u16) -> Result<()> {
        self.ensure_active()?;
        let spec = sensor_spec(sensor_id).ok_or(Error::UnknownSensor(sensor_id))?;

        let mut payload = Vec::with_capacity(3);
        payload.extend_from_slice(&sensor_id.to_be_bytes());
        payload.push(spec.width);

        let response = self.shared.request(
            OpCode::SubscribeRequest,
            &payload,
            self.shared.options.request_timeout,
        )?;
        confirm_ok(&response)?;

        self.shared.registry.record_subscription(sensor_id);
        log::info!("Subscribed to sensor {} ({})", sensor_id, spec.name);
        Ok(())
    }

    /// Cancel a sensor subscription
    pub fn unsubscribe(&self, sensor_id: u16) -> Result<()> {
        self.ensure_active()?;
        let spec = sensor_spec(sensor_id).ok_or(Error::UnknownSensor(sensor_id))?;

        let response = self.shared.request(
            OpCode::UnsubscribeRequest,
            &sensor_id.to_be_bytes(),
            self.shared.options.request_timeout,
        )?;
        confirm_ok(&response)?;

        self.shared.registry.remove_subscription(sensor_id);
        log::info!("Unsubscribed from sensor {} ({})", sensor_id, spec.name);
        Ok(())
    }

    /// Tear the session down
    ///
    /// Sends a best-effort close command (bounded wait), stops both worker
    /// loops and closes the transport. Idempotent: calling it again is a
    /// no-op.
    pub fn disconnect(&mut self) {
        let was_active = {
            let mut state = self.shared.state.lock();
            if *state == SessionState::Closed {
                return;
            }
            let was_active = *state == SessionState::Active;
            *state = SessionState::Closing;
            was_active
        };

        if was_active {
            log::info!("Disconnecting from bridge {}", self.bridge.uuid_hex());
            match self.shared.request(
                OpCode::CloseRequest,
                &[],
                self.shared.options.disconnect_timeout,
            ) {
                Ok(_) => log::debug!("Bridge confirmed session close"),
                Err(e) => log::debug!("Graceful close skipped: {}", e),
            }
        }

        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.drain_pending();

        if let Some(handle) = self.keepalive_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.read_thread.take() {
            let _ = handle.join();
        }

        *self.shared.state.lock() = SessionState::Closed;
        log::info!("Session closed");
    }

    fn ensure_active(&self) -> Result<()> {
        match *self.shared.state.lock() {
            SessionState::Active => Ok(()),
            _ => Err(Error::SessionClosed),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Check a one-byte confirmation payload for success
pub(crate) fn confirm_ok(payload: &[u8]) -> Result<()> {
    match payload.first() {
        Some(0) => Ok(()),
        Some(&code) => Err(Error::Bridge(code)),
        None => Err(Error::InvalidResponse("empty confirmation".to_string())),
    }
}

/// Read loop - drains the transport and routes complete frames
///
/// Transport failures and corrupt frames are fatal to the session: the
/// loop transitions to `Error` and exits, waking every waiter.
fn read_loop(shared: Arc<Shared>) {
    log::debug!("Read loop started");
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];

    while !shared.shutdown.load(Ordering::Relaxed) {
        let read_result = { shared.transport.lock().read(&mut buf) };

        match read_result {
            Ok(0) => {
                // Nothing available, yield before polling again
                thread::sleep(IDLE_SLEEP);
            }
            Ok(n) => {
                decoder.feed(&buf[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(frame)) => shared.handle_frame(frame),
                        Ok(None) => break,
                        Err(e) => {
                            log::error!("Frame decoding failed: {}", e);
                            shared.fail();
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                if !shared.shutdown.load(Ordering::Relaxed) {
                    log::error!("Transport read failed: {}", e);
                    shared.fail();
                }
                return;
            }
        }
    }

    log::debug!("Read loop exiting");
}

/// Keep-alive loop - periodic liveness request
///
/// A missing or failed reply is treated exactly like a transport error.
fn keepalive_loop(shared: Arc<Shared>) {
    log::debug!("Keep-alive loop started");
    let mut since_last = Duration::ZERO;

    while !shared.shutdown.load(Ordering::Relaxed) {
        thread::sleep(KEEPALIVE_TICK);
        since_last += KEEPALIVE_TICK;
        if since_last < shared.options.keepalive_interval {
            continue;
        }
        since_last = Duration::ZERO;

        if shared.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match shared.request(
            OpCode::KeepAliveRequest,
            &[],
            shared.options.request_timeout,
        ) {
            Ok(_) => log::trace!("Keep-alive acknowledged"),
            Err(Error::SessionClosed) => break,
            Err(e) => {
                log::error!("Keep-alive failed, treating as connection loss: {}", e);
                shared.fail();
                break;
            }
        }
    }

    log::debug!("Keep-alive loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SENSOR_FAN_SPEED_MODE;
    use crate::testutil::{
        fake_bridge, fake_bridge_ignoring, recording_callback, test_bridge_identity, test_local,
    };
    use crate::transport::MockTransport;
    use std::time::Instant;

    const PIN: u32 = 1234;

    fn options_with_timeout(request_timeout: Duration) -> SessionOptions {
        SessionOptions {
            handshake_timeout: Duration::from_secs(2),
            request_timeout,
            // Long enough that no keep-alive fires during a test
            keepalive_interval: Duration::from_secs(300),
            disconnect_timeout: Duration::from_millis(500),
        }
    }

    fn connect_mock(
        mock: &MockTransport,
        force_takeover: bool,
        options: SessionOptions,
    ) -> Result<Session> {
        let (callback, _) = recording_callback();
        Session::connect_with(
            Box::new(mock.clone()),
            test_bridge_identity("10.0.0.5:56747"),
            test_local(),
            PIN,
            force_takeover,
            callback,
            options,
        )
    }

    #[test]
    fn test_connect_reaches_active() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let mut session =
            connect_mock(&mock, false, options_with_timeout(Duration::from_secs(2))).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        session.disconnect();
    }

    #[test]
    fn test_wrong_pin_fails_authentication() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(4321, false));

        let err =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
    }

    #[test]
    fn test_existing_client_without_takeover() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, true));

        let err =
            connect_mock(&mock, false, options_with_timeout(Duration::from_secs(2))).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered));
    }

    #[test]
    fn test_existing_client_with_takeover() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, true));

        let mut session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        session.disconnect();
    }

    #[test]
    fn test_subscribe_records_sensor() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let mut session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap();
        session.subscribe(SENSOR_FAN_SPEED_MODE).unwrap();
        assert_eq!(session.subscriptions(), vec![SENSOR_FAN_SPEED_MODE]);

        session.unsubscribe(SENSOR_FAN_SPEED_MODE).unwrap();
        assert!(session.subscriptions().is_empty());
        session.disconnect();
    }

    #[test]
    fn test_subscribe_unknown_sensor_rejected() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let mut session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap();
        assert!(matches!(
            session.subscribe(9999),
            Err(Error::UnknownSensor(9999))
        ));
        session.disconnect();
    }

    #[test]
    fn test_request_timeout_frees_slot() {
        // The fake bridge never answers time requests, so the request must
        // time out and leave no stale waiter behind.
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge_ignoring(PIN, false, &[OpCode::TimeRequest]));

        let mut session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_millis(100))).unwrap();

        let err = session.request(OpCode::TimeRequest, &[]).unwrap_err();
        assert!(matches!(err, Error::RequestTimeout));
        assert!(session.shared.pending.lock().is_empty());

        // The session stays usable
        session.subscribe(SENSOR_FAN_SPEED_MODE).unwrap();
        session.disconnect();
    }

    #[test]
    fn test_concurrent_requests_resolve_by_id() {
        // Three outstanding requests answered in reverse order must each
        // receive their own payload.
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge_ignoring(PIN, false, &[OpCode::TimeRequest]));

        let session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(5))).unwrap();
        mock.clear_written();

        thread::scope(|scope| {
            let mut workers = Vec::new();
            for i in 1u8..=3 {
                let session = &session;
                workers.push(scope.spawn(move || {
                    let response = session.request(OpCode::TimeRequest, &[i]).unwrap();
                    assert_eq!(response, vec![i, 0xEE]);
                }));
            }

            // Collect the three outstanding time requests off the wire
            let deadline = Instant::now() + Duration::from_secs(2);
            let mut requests: Vec<(u32, u8)> = Vec::new();
            while requests.len() < 3 {
                assert!(Instant::now() < deadline, "requests never hit the wire");
                let mut decoder = FrameDecoder::new();
                decoder.feed(&mock.get_written());
                requests.clear();
                while let Ok(Some(frame)) = decoder.next_frame() {
                    if frame.op == OpCode::TimeRequest {
                        requests.push((frame.request_id, frame.payload[0]));
                    }
                }
                thread::sleep(Duration::from_millis(5));
            }

            // Answer newest first
            requests.sort_by_key(|&(id, _)| std::cmp::Reverse(id));
            for (id, tag) in requests {
                mock.inject_read(&encode_frame(OpCode::TimeConfirm, id, &[tag, 0xEE]));
            }

            for worker in workers {
                worker.join().unwrap();
            }
        });
    }

    #[test]
    fn test_unknown_response_id_dropped() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let mut session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap();

        // Response for a request nobody issued: logged and dropped
        mock.inject_read(&encode_frame(OpCode::TimeConfirm, 9999, &[0x00]));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(session.state(), SessionState::Active);

        // Normal traffic still works
        session.subscribe(SENSOR_FAN_SPEED_MODE).unwrap();
        session.disconnect();
    }

    #[test]
    fn test_corrupt_frame_is_fatal() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap();

        // Unknown operation tag forces the session into the error state
        mock.inject_read(&[0x00, 0x00, 0x00, 0x05, 0x7F, 0x00, 0x00, 0x00, 0x00]);

        let deadline = Instant::now() + Duration::from_secs(2);
        while session.state() != SessionState::Error {
            assert!(Instant::now() < deadline, "session never entered Error");
            thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(
            session.request(OpCode::TimeRequest, &[]),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let mut session =
            connect_mock(&mock, true, options_with_timeout(Duration::from_secs(2))).unwrap();
        session.disconnect();
        assert_eq!(session.state(), SessionState::Closed);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Closed);

        assert!(matches!(
            session.request(OpCode::TimeRequest, &[]),
            Err(Error::SessionClosed)
        ));
        assert!(matches!(
            session.subscribe(SENSOR_FAN_SPEED_MODE),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_notification_dispatch() {
        let mock = MockTransport::new();
        mock.set_responder(fake_bridge(PIN, false));

        let (callback, seen) = recording_callback();
        let mut session = Session::connect_with(
            Box::new(mock.clone()),
            test_bridge_identity("10.0.0.5:56747"),
            test_local(),
            PIN,
            true,
            callback,
            options_with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        session.subscribe(SENSOR_FAN_SPEED_MODE).unwrap();

        // Pushed update: sensor 65, one byte wide, value 2
        mock.inject_read(&encode_frame(
            OpCode::Notification,
            0,
            &[0x00, 0x41, 0x02],
        ));

        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.lock().is_empty() {
            assert!(Instant::now() < deadline, "callback never fired");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(seen.lock().as_slice(), &[(SENSOR_FAN_SPEED_MODE, 2)]);

        session.disconnect();
    }
}
