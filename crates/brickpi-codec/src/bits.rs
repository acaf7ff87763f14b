//! Bit-addressable byte buffer.
//!
//! Fields are packed least-significant bit first. Every access names an
//! explicit byte offset and bit offset, which are added to the running
//! cursor to get the absolute bit position:
//!
//! ```text
//! absolute bit = byte_offset * 8 + bit_offset + cursor
//! byte index   = absolute / 8,  bit within byte = absolute % 8
//! ```
//!
//! Writes and reads keep separate cursors, so one buffer can be filled and
//! then read back.

use crate::error::{CodecError, Result};

/// Widest field a single call may move.
pub const MAX_FIELD_WIDTH: u32 = 32;

/// A growable byte buffer with independent bit-level read and write cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
}

impl BitBuffer {
    /// Create an empty buffer for an outgoing message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes for decoding.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            write_pos: 0,
            read_pos: 0,
        }
    }

    /// Write the low `width` bits of `value` and advance the write cursor.
    ///
    /// The buffer is zero-extended to cover the highest byte touched. Bits
    /// that are zero in `value` are left as they were.
    pub fn add_bits(
        &mut self,
        byte_offset: usize,
        bit_offset: usize,
        width: u32,
        value: u32,
    ) -> Result<()> {
        check_width(width)?;
        if width == 0 {
            return Ok(());
        }

        let start = byte_offset * 8 + bit_offset + self.write_pos;
        let last_byte = (start + width as usize - 1) / 8;
        if self.bytes.len() <= last_byte {
            self.bytes.resize(last_byte + 1, 0);
        }

        for i in 0..width as usize {
            if (value >> i) & 1 == 1 {
                let bit = start + i;
                self.bytes[bit / 8] |= 1 << (bit % 8);
            }
        }

        self.write_pos += width as usize;
        Ok(())
    }

    /// Read `width` bits as an unsigned integer and advance the read cursor.
    ///
    /// A zero-width read returns 0 without moving the cursor. Reading past
    /// the end fails with [`CodecError::Truncated`] and leaves the cursor
    /// untouched.
    pub fn get_bits(&mut self, byte_offset: usize, bit_offset: usize, width: u32) -> Result<u32> {
        check_width(width)?;
        if width == 0 {
            return Ok(0);
        }

        let start = byte_offset * 8 + bit_offset + self.read_pos;
        let end = start + width as usize;
        let available = self.bytes.len() * 8;
        if end > available {
            return Err(CodecError::Truncated {
                needed: end,
                available,
            });
        }

        let mut value = 0u32;
        for i in 0..width as usize {
            let bit = start + i;
            if (self.bytes[bit / 8] >> (bit % 8)) & 1 == 1 {
                value |= 1 << i;
            }
        }

        self.read_pos += width as usize;
        Ok(value)
    }

    /// Append a field at the write cursor.
    pub fn push(&mut self, width: u32, value: u32) -> Result<()> {
        self.add_bits(0, 0, width, value)
    }

    /// Take the next field at the read cursor.
    pub fn take(&mut self, width: u32) -> Result<u32> {
        self.get_bits(0, 0, width)
    }

    /// Bits written so far.
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Bits read so far.
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// Bits left between the read cursor and the end of the buffer.
    pub fn remaining_bits(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.read_pos)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy of the backing bytes, in transmission order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn check_width(width: u32) -> Result<()> {
    if width > MAX_FIELD_WIDTH {
        return Err(CodecError::WidthTooLarge {
            width,
            max: MAX_FIELD_WIDTH,
        });
    }
    Ok(())
}
