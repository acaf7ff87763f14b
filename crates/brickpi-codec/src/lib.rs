//! Bit-level payload codecs for the BrickPi.
//!
//! Every BrickPi message body is a stream of odd-width fields packed least
//! significant bit first: 10-bit motor commands, 5-bit encoder lengths,
//! 1-bit touch readings, 3-bit colours, I2C device tables. [`BitBuffer`]
//! does the packing and the rest of this crate describes the layouts.

pub mod bits;
pub mod error;
pub mod i2c;
pub mod motor;
pub mod sensor;
pub mod values;

pub use bits::{BitBuffer, MAX_FIELD_WIDTH};
pub use error::{CodecError, Result};
pub use i2c::{settings, I2cBus, I2cDevice, MAX_I2C_DEVICES};
pub use motor::{decode_encoder, encode_motor_speed, MotorState, TICKS_PER_REVOLUTION};
pub use sensor::{decode_sensor_value, Colour, DeviceCodec, SensorKind, SensorValue};
pub use values::{
    decode_values_response, encode_sensor_setup, encode_values_request, ValuesReport,
    SLOTS_PER_CONTROLLER,
};
