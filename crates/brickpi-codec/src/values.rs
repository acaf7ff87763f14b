//! Whole-message layouts for one controller (two motor slots, two sensor slots).
//!
//! Sensor setup (`CONFIGURE_SENSORS` data):
//! ```text
//! type[0]:8  type[1]:8  setup bits of sensor 0  setup bits of sensor 1
//! ```
//!
//! Values request (`READ_SENSOR_VALUES` data):
//! ```text
//! encoder offsets:2 (unused, zero)  motor[0]:10  motor[1]:10
//! request bits of sensor 0  request bits of sensor 1
//! ```
//!
//! Values response (payload, including the echoed command byte):
//! ```text
//! command:8  enc_len[0]:5  enc_len[1]:5  enc[0]:enc_len[0]  enc[1]:enc_len[1]
//! value of sensor 0 (10 bits if absent)  value of sensor 1 (10 bits if absent)
//! ```

use serde::Serialize;

use crate::bits::BitBuffer;
use crate::error::Result;
use crate::motor::{decode_encoder, encode_absent_motor, MotorState, ENCODER_LENGTH_WIDTH};
use crate::sensor::{decode_sensor_value, DeviceCodec, SensorKind, SensorValue};

/// Motor or sensor slots per controller.
pub const SLOTS_PER_CONTROLLER: usize = 2;

/// Reserved encoder-offset bits at the start of a values request.
pub const ENCODER_OFFSET_BITS: u32 = 2;

/// Bits of the echoed command at the start of a response payload.
const COMMAND_WIDTH: u32 = 8;

/// Sensors plugged into one controller, by slot.
pub type SensorSlots<'a> = [Option<&'a SensorKind>; SLOTS_PER_CONTROLLER];

/// Motors attached to one controller, by slot.
pub type MotorSlots<'a> = [Option<&'a MotorState>; SLOTS_PER_CONTROLLER];

/// Build the `CONFIGURE_SENSORS` data for one controller.
pub fn encode_sensor_setup(sensors: SensorSlots<'_>) -> Result<BitBuffer> {
    let mut buf = BitBuffer::new();
    for sensor in sensors {
        buf.push(8, sensor.map_or(0, |kind| kind.type_code()) as u32)?;
    }
    for sensor in sensors.into_iter().flatten() {
        sensor.encode_setup(&mut buf)?;
    }
    Ok(buf)
}

/// Build the `READ_SENSOR_VALUES` data for one controller.
pub fn encode_values_request(motors: MotorSlots<'_>, sensors: SensorSlots<'_>) -> Result<BitBuffer> {
    let mut buf = BitBuffer::new();
    buf.push(ENCODER_OFFSET_BITS, 0)?;
    for motor in motors {
        match motor {
            Some(motor) => motor.encode(&mut buf)?,
            None => encode_absent_motor(&mut buf)?,
        }
    }
    for sensor in sensors.into_iter().flatten() {
        sensor.encode_request(&mut buf)?;
    }
    Ok(buf)
}

/// Encoders and sensor readings from one values response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuesReport {
    /// Signed encoder value per motor slot.
    pub encoders: [i32; SLOTS_PER_CONTROLLER],
    /// Reading per sensor slot; `None` where no sensor is configured.
    pub sensors: [Option<SensorValue>; SLOTS_PER_CONTROLLER],
}

/// Decode a `READ_SENSOR_VALUES` response payload.
///
/// `sensors` must match the slots the controller was configured with, since
/// the response carries no field boundaries of its own.
pub fn decode_values_response(payload: &[u8], sensors: SensorSlots<'_>) -> Result<ValuesReport> {
    let mut buf = BitBuffer::from_bytes(payload);
    buf.take(COMMAND_WIDTH)?;

    let lengths = [
        buf.take(ENCODER_LENGTH_WIDTH)?,
        buf.take(ENCODER_LENGTH_WIDTH)?,
    ];
    let mut encoders = [0i32; SLOTS_PER_CONTROLLER];
    for (encoder, length) in encoders.iter_mut().zip(lengths) {
        *encoder = decode_encoder(buf.take(length)?);
    }

    let [first, second] = sensors;
    let sensors = [
        decode_sensor_value(&mut buf, first)?,
        decode_sensor_value(&mut buf, second)?,
    ];

    tracing::trace!(
        ?lengths,
        ?encoders,
        unread = buf.remaining_bits(),
        "decoded values response"
    );
    Ok(ValuesReport { encoders, sensors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::i2c::{I2cBus, I2cDevice};

    #[test]
    fn setup_ultrasonic_on_first_slot() {
        let sensor = SensorKind::Ultrasonic;
        let buf = encode_sensor_setup([Some(&sensor), None]).unwrap();
        assert_eq!(buf.as_bytes(), &[0x29, 0x00, 0x0A, 0x08, 0x1C, 0x21, 0x04]);
    }

    #[test]
    fn setup_light_and_ultrasonic() {
        let light = SensorKind::Light { floodlight: false };
        let distance = SensorKind::Ultrasonic;
        let buf = encode_sensor_setup([Some(&light), Some(&distance)]).unwrap();
        assert_eq!(buf.as_bytes(), &[0x00, 0x29, 0x0A, 0x08, 0x1C, 0x21, 0x04]);
    }

    #[test]
    fn setup_touch_and_sound() {
        let touch = SensorKind::Touch;
        let sound = SensorKind::Sound;
        let buf = encode_sensor_setup([Some(&touch), Some(&sound)]).unwrap();
        assert_eq!(buf.as_bytes(), &[0x20, 0x00]);
    }

    #[test]
    fn setup_rejects_empty_bus() {
        let bus = SensorKind::I2c(I2cBus::new(0x0A));
        assert_eq!(
            encode_sensor_setup([None, Some(&bus)]).unwrap_err(),
            CodecError::EmptyI2cBus
        );
    }

    #[test]
    fn request_with_no_motors() {
        let buf = encode_values_request([None, None], [None, None]).unwrap();
        assert_eq!(buf.as_bytes(), &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn request_with_second_motor() {
        let mut motor = MotorState::new();
        motor.set_speed(200);
        let buf = encode_values_request([None, Some(&motor)], [None, None]).unwrap();
        assert_eq!(buf.as_bytes(), &[0x00, 0x10, 0x32]);

        motor.set_speed(0);
        let buf = encode_values_request([None, Some(&motor)], [None, None]).unwrap();
        assert_eq!(buf.as_bytes(), &[0x00, 0x10, 0x00]);
    }

    #[test]
    fn request_carries_unfixed_i2c_transfer() {
        let mut bus = I2cBus::new(0);
        bus.add_device(I2cDevice::register_reader(0x10, 0, 0x07, 1).unwrap())
            .unwrap();
        let sensor = SensorKind::I2c(bus);
        let buf = encode_values_request([None, None], [Some(&sensor), None]).unwrap();
        assert_eq!(buf.write_position(), 2 + 20 + 16);
    }

    #[test]
    fn decode_encoder_on_second_slot() {
        let report =
            decode_values_response(&[0x03, 0xE0, 0x09, 0x89, 0xFF, 0xFF, 0x1F], [None, None])
                .unwrap();
        assert_eq!(report.encoders, [0, 12577]);
        assert_eq!(report.sensors, [None, None]);
    }

    #[test]
    fn decode_ultrasonic_far() {
        let sensor = SensorKind::Ultrasonic;
        let report = decode_values_response(
            &[0x03, 0x10, 0xb0, 0x75, 0xff, 0xff, 0x3f],
            [Some(&sensor), None],
        )
        .unwrap();
        assert_eq!(report.sensors[0], Some(SensorValue::Distance(Some(255))));
    }

    #[test]
    fn decode_ultrasonic_near() {
        let sensor = SensorKind::Ultrasonic;
        let report =
            decode_values_response(&[0x03, 0x00, 0xAC, 0xF8, 0x1F], [Some(&sensor), None])
                .unwrap();
        assert_eq!(report.sensors[0], Some(SensorValue::Distance(Some(21))));
    }

    #[test]
    fn decode_light_and_ultrasonic() {
        let light = SensorKind::Light { floodlight: false };
        let distance = SensorKind::Ultrasonic;
        let report = decode_values_response(
            &[0x03, 0x40, 0x08, 0xE1, 0x7F],
            [Some(&light), Some(&distance)],
        )
        .unwrap();
        assert_eq!(report.encoders, [0, 1]);
        assert_eq!(
            report.sensors,
            [
                Some(SensorValue::Light(47)),
                Some(SensorValue::Distance(Some(255)))
            ]
        );
    }

    #[test]
    fn decode_short_payload_fails() {
        let sensor = SensorKind::Ultrasonic;
        let err = decode_values_response(&[0x03, 0x00, 0xAC], [Some(&sensor), Some(&sensor)])
            .unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
