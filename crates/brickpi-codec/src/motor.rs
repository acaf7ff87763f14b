//! Motor command encoding and encoder decoding.

use std::time::Instant;

use serde::Serialize;

use crate::bits::BitBuffer;
use crate::error::Result;

/// Bits in one motor command field.
pub const MOTOR_FIELD_WIDTH: u32 = 10;

/// Bits holding each encoder word length in a values response.
pub const ENCODER_LENGTH_WIDTH: u32 = 5;

/// Encoder ticks per output shaft revolution.
pub const TICKS_PER_REVOLUTION: f64 = 720.0;

/// Largest speed magnitude the firmware accepts.
pub const MAX_SPEED: u32 = 255;

/// Pack enable, direction and clamped magnitude into one 10-bit field.
///
/// ```text
/// bit 0: enable   bit 1: reverse   bits 2..=9: |speed| (max 255)
/// ```
pub fn encode_motor_speed(buf: &mut BitBuffer, speed: i32, enabled: bool) -> Result<()> {
    let magnitude = speed.unsigned_abs().min(MAX_SPEED);
    let reverse = speed < 0;
    let field = enabled as u32 | (reverse as u32) << 1 | magnitude << 2;
    buf.push(MOTOR_FIELD_WIDTH, field)
}

/// Field written for a slot without a motor.
pub fn encode_absent_motor(buf: &mut BitBuffer) -> Result<()> {
    buf.push(MOTOR_FIELD_WIDTH, 0)
}

/// Decode a raw encoder word. The low bit is the sign.
pub fn decode_encoder(word: u32) -> i32 {
    let magnitude = (word >> 1) as i32;
    if word & 1 == 1 {
        -magnitude
    } else {
        magnitude
    }
}

/// Host-side state of one motor: what to send and what was last read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MotorState {
    requested_speed: i32,
    enabled: bool,
    #[serde(skip)]
    encoder_offset: Option<i32>,
    encoder: Option<i32>,
    #[serde(skip)]
    last_reading: Option<Instant>,
    rpm: f64,
}

impl MotorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a speed in `-255..=255`. Any non-zero speed enables the motor.
    pub fn set_speed(&mut self, speed: i32) {
        if speed != 0 {
            self.enabled = true;
        }
        self.requested_speed = speed;
    }

    /// Release the motor so it coasts.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.requested_speed = 0;
    }

    pub fn requested_speed(&self) -> i32 {
        self.requested_speed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Encode this motor's command field.
    pub fn encode(&self, buf: &mut BitBuffer) -> Result<()> {
        encode_motor_speed(buf, self.requested_speed, self.enabled)
    }

    /// Record a decoded encoder value read at `now` and update the speed.
    pub fn record_encoder(&mut self, value: i32, now: Instant) {
        if self.encoder_offset.is_none() {
            self.encoder_offset = Some(value);
        }

        if !self.enabled {
            self.rpm = 0.0;
        } else if let (Some(previous), Some(then)) = (self.encoder, self.last_reading) {
            let elapsed_ms = now.saturating_duration_since(then).as_secs_f64() * 1000.0;
            if elapsed_ms > 0.0 {
                let ticks = (value - previous) as f64;
                self.rpm = (ticks / elapsed_ms / TICKS_PER_REVOLUTION * 1000.0 * 60.0).abs();
            }
        }

        self.encoder = Some(value);
        self.last_reading = Some(now);
    }

    /// Last encoder value, if one has been read.
    pub fn encoder(&self) -> Option<i32> {
        self.encoder
    }

    /// Ticks travelled since the first reading.
    pub fn position(&self) -> Option<i32> {
        Some(self.encoder? - self.encoder_offset?)
    }

    /// Measured speed in revolutions per minute.
    pub fn rpm(&self) -> f64 {
        self.rpm
    }
}
