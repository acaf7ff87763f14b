//! `tokio_util` codec for use with `FramedRead` / `FramedWrite`.

use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::assembler::{FrameAssembler, FrameEvent};
use crate::codec::{encode_request, Request, DEFAULT_FRAME_TIMEOUT};
use crate::error::FrameError;

/// Decodes response events and encodes requests.
///
/// Decoding goes through a [`FrameAssembler`], so the assembler's per-frame
/// timeout still applies: a partial frame left over from an earlier burst is
/// dropped once it goes stale.
pub struct LinkCodec {
    assembler: FrameAssembler,
}

impl LinkCodec {
    /// Create a codec with the given per-frame timeout.
    pub fn new(frame_timeout: Duration) -> Self {
        Self {
            assembler: FrameAssembler::with_timeout(frame_timeout),
        }
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    /// Borrow the frame assembler.
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }
}

impl Default for LinkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_TIMEOUT)
    }
}

impl Decoder for LinkCodec {
    type Item = FrameEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let now = Instant::now();
        if let Some(event) = self.assembler.poll_timeout(now) {
            return Ok(Some(event));
        }

        // Consume only up to the first completed frame; the rest stays in
        // `src` for the next call.
        let mut consumed = 0;
        let mut found = None;
        for byte in src.iter() {
            consumed += 1;
            if let Some(event) = self.assembler.push_byte(*byte, now) {
                found = Some(event);
                break;
            }
        }
        src.advance(consumed);
        Ok(found)
    }
}

impl Encoder<Request> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_request(item.address, item.command, &item.data, dst)
    }
}
