//! TCP transport implementation

use super::Transport;
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Read timeout keeping the read loop responsive to shutdown
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// TCP transport for the persistent bridge connection
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to the bridge's published port
    ///
    /// # Arguments
    /// * `addr` - Bridge address (e.g., "10.0.0.5:56747")
    /// * `timeout` - Connect timeout
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_nodelay(true)?;

        log::info!("Connected to bridge at {}", addr);

        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.stream.read(buffer) {
            // A TCP read of zero bytes means the peer closed the connection
            Ok(0) => Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into())),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.stream.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
