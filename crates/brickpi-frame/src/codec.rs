use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Request header: address (1) + checksum (1) + length (1) + command (1).
pub const REQUEST_HEADER_SIZE: usize = 4;

/// Response header: checksum (1) + length (1).
pub const RESPONSE_HEADER_SIZE: usize = 2;

/// Largest request data section; the length byte also counts the command.
pub const MAX_DATA_LEN: usize = u8::MAX as usize - 1;

/// How long a started response frame may take to complete.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(5000);

/// An addressed command sent from the host to one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Destination controller (or the broadcast address).
    pub address: u8,
    /// Command code.
    pub command: u8,
    /// Command data, excluding the command byte.
    pub data: Bytes,
}

impl Request {
    /// Create a new request.
    pub fn new(address: u8, command: u8, data: impl Into<Bytes>) -> Self {
        Self {
            address,
            command,
            data: data.into(),
        }
    }

    /// Checksum this request carries on the wire.
    pub fn checksum(&self) -> u8 {
        request_checksum(self.address, self.command, &self.data)
    }

    /// The total wire size of this request (header + data).
    pub fn wire_size(&self) -> usize {
        REQUEST_HEADER_SIZE + self.data.len()
    }
}

/// A validated response frame from a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    command: u8,
    payload: Bytes,
}

impl Response {
    /// Wrap a response payload. Returns `None` for an empty payload, which
    /// has no command byte to key on.
    pub fn from_payload(payload: impl Into<Bytes>) -> Option<Self> {
        let payload = payload.into();
        let command = *payload.first()?;
        Some(Self { command, payload })
    }

    /// Command code echoed by the controller.
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Full payload, starting with the echoed command byte.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload after the echoed command byte.
    pub fn data(&self) -> &[u8] {
        &self.payload[1..]
    }
}

/// Checksum of a request: address + length + command + data, mod 256.
pub fn request_checksum(address: u8, command: u8, data: &[u8]) -> u8 {
    let length = (data.len() as u8).wrapping_add(1);
    data.iter().fold(
        address.wrapping_add(length).wrapping_add(command),
        |sum, byte| sum.wrapping_add(*byte),
    )
}

/// Checksum of a response: length + payload, mod 256.
pub fn response_checksum(payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(payload.len() as u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Encode a request into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────┬──────────┬──────────┬─────────┬──────────────────┐
/// │ Address │ Checksum │ Length   │ Command │ Data             │
/// │ (1B)    │ (1B)     │ 1 + data │ (1B)    │ (Length - 1 B)   │
/// └─────────┴──────────┴──────────┴─────────┴──────────────────┘
/// ```
pub fn encode_request(address: u8, command: u8, data: &[u8], dst: &mut BytesMut) -> Result<()> {
    if data.len() > MAX_DATA_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: data.len(),
            max: MAX_DATA_LEN,
        });
    }
    dst.reserve(REQUEST_HEADER_SIZE + data.len());
    dst.put_u8(address);
    dst.put_u8(request_checksum(address, command, data));
    dst.put_u8(data.len() as u8 + 1);
    dst.put_u8(command);
    dst.put_slice(data);
    Ok(())
}

/// Decode a request from a buffer (the controller's side of the link).
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete request yet.
/// On success, consumes the request bytes from the buffer.
pub fn decode_request(src: &mut BytesMut) -> Result<Option<Request>> {
    if src.len() < REQUEST_HEADER_SIZE {
        return Ok(None);
    }

    let length = src[2];
    if length == 0 {
        return Err(FrameError::InvalidLength(length));
    }

    let total = REQUEST_HEADER_SIZE - 1 + length as usize;
    if src.len() < total {
        return Ok(None);
    }

    let address = src.get_u8();
    let checksum = src.get_u8();
    src.advance(1);
    let command = src.get_u8();
    let data = src.split_to(length as usize - 1).freeze();

    let actual = request_checksum(address, command, &data);
    if actual != checksum {
        return Err(FrameError::ChecksumMismatch {
            expected: checksum,
            actual,
        });
    }

    Ok(Some(Request {
        address,
        command,
        data,
    }))
}

/// Encode a response frame (the controller's side of the link).
pub fn encode_response(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u8::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u8::MAX as usize,
        });
    }
    dst.reserve(RESPONSE_HEADER_SIZE + payload.len());
    dst.put_u8(response_checksum(payload));
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum request data size in bytes. Default: [`MAX_DATA_LEN`].
    pub max_data_len: usize,
    /// How long a started response frame may take. Default: 5 s.
    pub frame_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_data_len: MAX_DATA_LEN,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }
}
