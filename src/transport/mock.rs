//! Mock transport for testing

use super::Transport;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Responder invoked for every write; its return bytes become readable
pub type MockResponder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// Mock transport for unit testing
///
/// Data can be injected directly with [`inject_read`](Self::inject_read),
/// or produced by a scripted responder that plays the bridge's role: every
/// write is handed to the responder and whatever it returns is appended to
/// the read buffer. The responder form makes handshake tests race-free,
/// since a reply only becomes readable after the request went out.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    responder: Option<MockResponder>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                responder: None,
            })),
        }
    }

    /// Install a scripted responder playing the bridge's role
    pub fn set_responder(&self, responder: MockResponder) {
        self.inner.lock().responder = Some(responder);
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        inner.read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let available = inner.read_buffer.len().min(buffer.len());

        for item in buffer.iter_mut().take(available) {
            *item = inner.read_buffer.pop_front().unwrap();
        }

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.write_buffer.extend_from_slice(data);

        if let Some(mut responder) = inner.responder.take() {
            let reply = responder(data);
            inner.read_buffer.extend(&reply);
            inner.responder = Some(responder);
        }

        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
