use std::time::Duration;

/// Errors that can occur during frame encoding, decoding and I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The request data does not fit the one-byte length field.
    #[error("request data too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A decoded request failed its checksum.
    #[error("checksum mismatch (frame says {expected:#04x}, computed {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// A request header declared a length that cannot hold a command byte.
    #[error("invalid request length {0}")]
    InvalidLength(u8),

    /// No complete frame arrived before the caller's deadline.
    #[error("no complete frame before the read deadline")]
    ReadTimeout,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying link reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] brickpi_transport::TransportError),

    /// The link was closed before a complete frame was received.
    #[error("link closed (incomplete frame)")]
    ConnectionClosed,
}

/// Why the assembler rejected an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameFault {
    /// The trailing sum did not match the checksum byte.
    #[error("checksum mismatch (frame says {expected:#04x}, computed {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The frame was not completed before the assembler deadline.
    #[error("frame not completed within {0:?}")]
    Timeout(Duration),

    /// The frame declared a zero-length payload, so it has no command byte.
    #[error("zero-length frame")]
    Empty,
}

pub type Result<T> = std::result::Result<T, FrameError>;
