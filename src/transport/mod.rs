//! Transport layer for I/O abstraction

use crate::error::{Error, Result};

mod mock;
mod tcp;

pub use mock::{MockResponder, MockTransport};
pub use tcp::TcpTransport;

/// Transport trait for bridge communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read
    ///
    /// A read timeout is reported as `Ok(0)`; a closed connection is an
    /// error.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Write the whole buffer, then flush
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(Error::Io(std::io::ErrorKind::WriteZero.into()));
            }
            data = &data[n..];
        }
        self.flush()
    }
}
