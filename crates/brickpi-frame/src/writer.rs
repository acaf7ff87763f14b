use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use brickpi_transport::SerialLink;

use crate::codec::{encode_request, FrameConfig, Request, REQUEST_HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Writes request frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(REQUEST_HEADER_SIZE + config.max_data_len),
            config,
        }
    }

    /// Write a complete request (blocking).
    pub fn write_request(&mut self, request: &Request) -> Result<()> {
        self.send(request.address, request.command, request.data.as_ref())
    }

    /// Encode and send a command to an address.
    pub fn send(&mut self, address: u8, command: u8, data: &[u8]) -> Result<()> {
        if data.len() > self.config.max_data_len {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: self.config.max_data_len,
            });
        }

        self.buf.clear();
        encode_request(address, command, data, &mut self.buf)?;
        tracing::trace!(address, command, len = self.buf.len(), "writing request");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: SerialLink> FrameWriter<T> {
    /// Discard stale bytes waiting in the link's receive buffer.
    pub fn clear_input(&mut self) -> Result<()> {
        self.inner.clear_input()?;
        Ok(())
    }
}
