use std::time::Duration;

use brickpi_frame::FrameFault;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error (opening or configuring the link).
    #[error("transport error: {0}")]
    Transport(#[from] brickpi_transport::TransportError),

    /// Frame-level error that retrying cannot fix.
    #[error("frame error: {0}")]
    Frame(#[from] brickpi_frame::FrameError),

    /// Payload codec error.
    #[error("codec error: {0}")]
    Codec(#[from] brickpi_codec::CodecError),

    /// The reply to `command` failed its checksum.
    #[error("checksum mismatch in reply to command {command:#04x} (frame says {expected:#04x}, computed {actual:#04x})")]
    ChecksumMismatch { command: u8, expected: u8, actual: u8 },

    /// A zero-length frame arrived while waiting for a reply.
    #[error("empty frame while waiting for a reply")]
    EmptyFrame,

    /// No matching reply arrived in time.
    #[error("no reply within {0:?}")]
    ReadTimeout(Duration),

    /// Writing the request to the link failed.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),

    /// Reading the reply from the link failed.
    #[error("transport read failed: {0}")]
    TransportRead(#[source] std::io::Error),

    /// Every attempt failed.
    #[error("command {command:#04x} to address {address} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        address: u8,
        command: u8,
        attempts: u32,
        #[source]
        last: Box<LinkError>,
    },

    /// An exchange for this address and command is already in flight.
    #[error("exchange for command {command:#04x} to address {address} already pending")]
    Busy { address: u8, command: u8 },

    /// Motor or sensor port outside the board.
    #[error("invalid {kind} port {port} (valid: 0..={max})")]
    InvalidPort {
        kind: &'static str,
        port: u8,
        max: u8,
    },

    /// Controller address that cannot be used for this operation.
    #[error("invalid controller address {0}")]
    InvalidAddressRange(u8),

    /// A reply whose command byte is not a known command.
    #[error("unknown response code {0:#04x}")]
    UnknownResponseCode(u8),

    /// A well-formed reply that no exchange was waiting for.
    #[error("unexpected response to command {0:#04x}")]
    UnexpectedResponse(u8),

    /// A rejected frame that no exchange was waiting for.
    #[error("stray frame fault (command {command:?}): {fault}")]
    StrayFault {
        command: Option<u8>,
        fault: FrameFault,
    },

    /// A reply that decoded but did not carry the expected fields.
    #[error("malformed reply to command {command:#04x}: {message}")]
    MalformedReply { command: u8, message: String },

    /// The board is not in a state that allows this operation.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Invalid board configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// True for per-attempt failures that a resend may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::EmptyFrame
                | Self::ReadTimeout(_)
                | Self::TransportWrite(_)
                | Self::TransportRead(_)
        )
    }

    /// Map a fault the assembler reported for the awaited command.
    pub(crate) fn from_fault(command: Option<u8>, fault: FrameFault) -> Self {
        match fault {
            FrameFault::ChecksumMismatch { expected, actual } => Self::ChecksumMismatch {
                command: command.unwrap_or_default(),
                expected,
                actual,
            },
            FrameFault::Timeout(timeout) => Self::ReadTimeout(timeout),
            FrameFault::Empty => Self::EmptyFrame,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
