use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::Instant;

use crate::assembler::{FrameAssembler, FrameEvent};
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Reads response frames from any `Read` stream.
///
/// The stream is expected to return `TimedOut` or `WouldBlock` when no data
/// is pending (a serial port with a short read timeout). Partial reads are
/// handled internally, and bytes read past the end of one frame are kept
/// for the next call.
pub struct FrameReader<T> {
    inner: T,
    assembler: FrameAssembler,
    ready: VecDeque<FrameEvent>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            assembler: FrameAssembler::with_timeout(config.frame_timeout),
            ready: VecDeque::new(),
            config,
        }
    }

    /// Read until the next frame event or until `deadline` passes.
    ///
    /// Returns `Err(FrameError::ReadTimeout)` at the deadline, discarding
    /// any partial frame, and `Err(FrameError::ConnectionClosed)` on EOF.
    pub fn read_event(&mut self, deadline: Instant) -> Result<FrameEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(event);
            }

            let now = Instant::now();
            if let Some(event) = self.assembler.poll_timeout(now) {
                return Ok(event);
            }
            if now >= deadline {
                self.assembler.reset();
                return Err(FrameError::ReadTimeout);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            let events = self.assembler.push(&chunk[..read], Instant::now());
            self.ready.extend(events);
        }
    }

    /// Discard any partial frame and any events not yet returned.
    pub fn reset(&mut self) {
        if !self.ready.is_empty() {
            tracing::debug!(dropped = self.ready.len(), "dropping buffered frame events");
        }
        self.ready.clear();
        self.assembler.reset();
    }

    /// Borrow the frame assembler.
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
