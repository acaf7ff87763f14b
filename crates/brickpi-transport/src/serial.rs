use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::SerialLink;

/// Baud rate the BrickPi firmware listens at.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// UART-backed link.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortLink {
    /// Open the serial device at `path`.
    pub fn open(path: impl Into<String>, baud_rate: u32) -> Result<Self> {
        let path = path.into();
        let port = serialport::new(path.as_str(), baud_rate)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()
            .map_err(|err| TransportError::Open {
                path: path.clone(),
                message: err.to_string(),
            })?;

        debug!(%path, baud_rate, "opened serial link");
        Ok(Self { port, path })
    }

    /// Device path this link was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Read for SerialPortLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialPortLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialPortLink {
    fn clear_input(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|err| TransportError::Io(err.into()))
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|err| TransportError::Io(err.into()))
    }

    fn try_clone_link(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|err| TransportError::Clone(err.to_string()))?;
        Ok(Self {
            port,
            path: self.path.clone(),
        })
    }
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("path", &self.path)
            .finish()
    }
}
