//! Checksummed request/response framing for the BrickPi serial link.
//!
//! Requests (host → board) carry an address, a checksum, a length and a
//! command byte. Responses (board → host) carry only a checksum and a
//! length; the first payload byte echoes the command being answered.
//!
//! The receive side is a byte-driven state machine ([`FrameAssembler`]) so
//! reads of any size, including one byte at a time or several frames at
//! once, reassemble into the same events.

pub mod assembler;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod link_codec;

pub use assembler::{AssemblerState, FrameAssembler, FrameEvent};
pub use codec::{
    decode_request, encode_request, encode_response, request_checksum, response_checksum,
    FrameConfig, Request, Response, DEFAULT_FRAME_TIMEOUT, MAX_DATA_LEN, REQUEST_HEADER_SIZE,
    RESPONSE_HEADER_SIZE,
};
pub use command::{
    BROADCAST_ADDRESS, CHANGE_UART_ADDRESS, CONFIGURE_SENSORS, EMERGENCY_STOP,
    READ_SENSOR_VALUES, SET_COMMUNICATION_TIMEOUT,
};
pub use error::{FrameError, FrameFault, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use link_codec::LinkCodec;
