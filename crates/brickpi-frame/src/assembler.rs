//! Byte-driven reassembly of response frames.
//!
//! The board sends `[checksum, length, payload…]`. Reads from a serial port
//! may split a frame anywhere or deliver several frames at once, so the
//! assembler consumes bytes one at a time and emits a [`FrameEvent`] for
//! every frame it completes or rejects.

use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::codec::{Response, DEFAULT_FRAME_TIMEOUT};
use crate::error::FrameFault;

/// Outcome of a completed (or abandoned) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame whose checksum matched.
    Response(Response),
    /// A frame that was discarded. `command` is the first payload byte when
    /// one arrived, so a waiting requester can be failed fast.
    Rejected {
        command: Option<u8>,
        fault: FrameFault,
    },
}

impl FrameEvent {
    /// Command code this event is keyed by, if known.
    pub fn command(&self) -> Option<u8> {
        match self {
            Self::Response(response) => Some(response.command()),
            Self::Rejected { command, .. } => *command,
        }
    }
}

/// Observable phase of the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for a checksum byte.
    Idle,
    /// Checksum seen, waiting for the length byte.
    AwaitingLength,
    /// Collecting payload bytes.
    Accumulating,
}

enum Phase {
    Idle,
    AwaitingLength {
        checksum: u8,
    },
    Accumulating {
        checksum: u8,
        remaining: usize,
        sum: u8,
        payload: BytesMut,
    },
}

/// Reassembles response frames from arbitrarily chunked input.
pub struct FrameAssembler {
    phase: Phase,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler with the default frame timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FRAME_TIMEOUT)
    }

    /// Create an assembler that abandons frames not completed within `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            deadline: None,
            timeout,
        }
    }

    /// Current phase.
    pub fn state(&self) -> AssemblerState {
        match self.phase {
            Phase::Idle => AssemblerState::Idle,
            Phase::AwaitingLength { .. } => AssemblerState::AwaitingLength,
            Phase::Accumulating { .. } => AssemblerState::Accumulating,
        }
    }

    /// Deadline of the frame in progress, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Configured frame timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Feed a chunk of received bytes and collect every event it completes.
    ///
    /// A frame whose deadline passed before `now` is abandoned first, so the
    /// chunk is parsed as the start of a new frame.
    pub fn push(&mut self, chunk: &[u8], now: Instant) -> Vec<FrameEvent> {
        tracing::trace!(len = chunk.len(), state = ?self.state(), "assembler chunk");

        let mut events = Vec::new();
        events.extend(self.poll_timeout(now));
        for byte in chunk {
            events.extend(self.push_byte(*byte, now));
        }
        events
    }

    /// Feed one byte. Returns an event when this byte finishes a frame.
    pub fn push_byte(&mut self, byte: u8, now: Instant) -> Option<FrameEvent> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                self.deadline = Some(now + self.timeout);
                self.phase = Phase::AwaitingLength { checksum: byte };
                None
            }
            Phase::AwaitingLength { checksum } => {
                if byte == 0 {
                    self.deadline = None;
                    tracing::warn!("discarding zero-length frame");
                    return Some(FrameEvent::Rejected {
                        command: None,
                        fault: FrameFault::Empty,
                    });
                }
                tracing::debug!(length = byte, "frame started");
                self.phase = Phase::Accumulating {
                    checksum,
                    remaining: byte as usize,
                    sum: byte,
                    payload: BytesMut::with_capacity(byte as usize),
                };
                None
            }
            Phase::Accumulating {
                checksum,
                remaining,
                sum,
                mut payload,
            } => {
                payload.extend_from_slice(&[byte]);
                let sum = sum.wrapping_add(byte);
                if remaining > 1 {
                    self.phase = Phase::Accumulating {
                        checksum,
                        remaining: remaining - 1,
                        sum,
                        payload,
                    };
                    return None;
                }

                self.deadline = None;
                if sum != checksum {
                    tracing::warn!(
                        expected = checksum,
                        actual = sum,
                        command = payload[0],
                        "discarding frame with bad checksum"
                    );
                    return Some(FrameEvent::Rejected {
                        command: Some(payload[0]),
                        fault: FrameFault::ChecksumMismatch {
                            expected: checksum,
                            actual: sum,
                        },
                    });
                }

                let response = Response::from_payload(payload.freeze())?;
                tracing::debug!(
                    command = response.command(),
                    len = response.payload().len(),
                    "frame complete"
                );
                Some(FrameEvent::Response(response))
            }
        }
    }

    /// Abandon the frame in progress if its deadline has passed.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<FrameEvent> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        let command = match &self.phase {
            Phase::Accumulating { payload, .. } => payload.first().copied(),
            _ => None,
        };
        tracing::warn!(
            state = ?self.state(),
            timeout = ?self.timeout,
            "abandoning incomplete frame"
        );
        self.reset();
        Some(FrameEvent::Rejected {
            command,
            fault: FrameFault::Timeout(self.timeout),
        })
    }

    /// Drop any partial frame and return to idle.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_response;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_response(payload, &mut buf).unwrap();
        buf.to_vec()
    }

    fn response(event: &FrameEvent) -> &Response {
        match event {
            FrameEvent::Response(response) => response,
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn single_chunk_frame() {
        let mut assembler = FrameAssembler::new();
        let events = assembler.push(&[0x09, 0x03, 0x01, 0x02, 0x03], Instant::now());

        assert_eq!(events.len(), 1);
        let response = response(&events[0]);
        assert_eq!(response.command(), 0x01);
        assert_eq!(response.data(), &[0x02, 0x03]);
        assert_eq!(assembler.state(), AssemblerState::Idle);
        assert!(assembler.deadline().is_none());
    }

    #[test]
    fn every_split_point_yields_same_frame() {
        let wire = frame(&[0x03, 0xE0, 0x09, 0x89, 0xFF, 0xFF, 0x1F]);
        let now = Instant::now();

        let mut whole = FrameAssembler::new();
        let expected = whole.push(&wire, now);
        assert_eq!(expected.len(), 1);

        for split in 1..wire.len() {
            let mut assembler = FrameAssembler::new();
            let mut events = assembler.push(&wire[..split], now);
            events.extend(assembler.push(&wire[split..], now));
            assert_eq!(events, expected, "split at {split}");
        }
    }

    #[test]
    fn byte_at_a_time() {
        let wire = frame(&[0x05, 0x00]);
        let now = Instant::now();
        let mut assembler = FrameAssembler::new();

        let mut events = Vec::new();
        for (i, byte) in wire.iter().enumerate() {
            let event = assembler.push_byte(*byte, now);
            if i + 1 < wire.len() {
                assert!(event.is_none());
            }
            events.extend(event);
        }

        assert_eq!(events.len(), 1);
        assert_eq!(response(&events[0]).command(), 0x05);
    }

    #[test]
    fn concatenated_frames_in_order() {
        let mut wire = frame(&[0x02]);
        wire.extend(frame(&[0x03, 0x10, 0x20]));

        let mut assembler = FrameAssembler::new();
        let events = assembler.push(&wire, Instant::now());

        assert_eq!(events.len(), 2);
        assert_eq!(response(&events[0]).command(), 0x02);
        assert_eq!(response(&events[1]).command(), 0x03);
    }

    #[test]
    fn bad_checksum_rejected_with_command() {
        let mut wire = frame(&[0x03, 0x10]);
        wire[0] = wire[0].wrapping_add(1);

        let mut assembler = FrameAssembler::new();
        let events = assembler.push(&wire, Instant::now());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].command(), Some(0x03));
        assert!(matches!(
            events[0],
            FrameEvent::Rejected {
                fault: FrameFault::ChecksumMismatch { .. },
                ..
            }
        ));
        assert_eq!(assembler.state(), AssemblerState::Idle);
    }

    #[test]
    fn checksum_wraps_around() {
        let payload = [0x03, 0xFF, 0xFF, 0xFF];
        let wire = frame(&payload);
        assert_eq!(wire[0], (4u32 + 3 + 3 * 0xFF) as u8);

        let mut assembler = FrameAssembler::new();
        let events = assembler.push(&wire, Instant::now());
        assert_eq!(response(&events[0]).payload().as_ref(), &payload);
    }

    #[test]
    fn zero_length_frame_is_empty_fault() {
        let mut assembler = FrameAssembler::new();
        let events = assembler.push(&[0x00, 0x00], Instant::now());
        assert_eq!(
            events,
            vec![FrameEvent::Rejected {
                command: None,
                fault: FrameFault::Empty
            }]
        );
        assert_eq!(assembler.state(), AssemblerState::Idle);
    }

    #[test]
    fn timeout_abandons_partial_frame() {
        let timeout = Duration::from_millis(20);
        let mut assembler = FrameAssembler::with_timeout(timeout);
        let start = Instant::now();

        assert!(assembler.push(&[0x09, 0x03, 0x01], start).is_empty());
        assert_eq!(assembler.state(), AssemblerState::Accumulating);
        assert_eq!(assembler.deadline(), Some(start + timeout));

        assert!(assembler.poll_timeout(start + timeout / 2).is_none());
        let event = assembler.poll_timeout(start + timeout).unwrap();
        assert_eq!(
            event,
            FrameEvent::Rejected {
                command: Some(0x01),
                fault: FrameFault::Timeout(timeout)
            }
        );
        assert_eq!(assembler.state(), AssemblerState::Idle);
    }

    #[test]
    fn fresh_frame_after_stale_bytes() {
        let timeout = Duration::from_millis(20);
        let mut assembler = FrameAssembler::with_timeout(timeout);
        let start = Instant::now();

        // A stale prefix of some earlier frame.
        assert!(assembler.push(&[0x44, 0x05], start).is_empty());

        let later = start + timeout * 2;
        let events = assembler.push(&frame(&[0x04]), later);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            FrameEvent::Rejected {
                command: None,
                fault: FrameFault::Timeout(_)
            }
        ));
        assert_eq!(response(&events[1]).command(), 0x04);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut assembler = FrameAssembler::new();
        assembler.push(&[0x09], Instant::now());
        assert_eq!(assembler.state(), AssemblerState::AwaitingLength);

        assembler.reset();
        assert_eq!(assembler.state(), AssemblerState::Idle);
        assert!(assembler.deadline().is_none());
    }
}
