use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A byte pipe to the BrickPi that also implements Read + Write.
///
/// Reads are expected to return `TimedOut` or `WouldBlock` once the
/// configured read timeout elapses without data, so callers can poll their
/// own deadlines between reads.
pub trait SerialLink: Read + Write + Send {
    /// Discard anything sitting in the receive buffer.
    ///
    /// Called before every request so a stale reply from an abandoned
    /// exchange cannot be mistaken for the next response.
    fn clear_input(&mut self) -> Result<()>;

    /// Bound how long a single read may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Open an independent handle onto the same link.
    ///
    /// The reader and the writer each own one handle.
    fn try_clone_link(&self) -> Result<Self>
    where
        Self: Sized;
}
