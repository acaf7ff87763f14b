//! Sensor kinds and their setup/request/value field layouts.

use serde::{Deserialize, Serialize};

use crate::bits::BitBuffer;
use crate::error::Result;
use crate::i2c::I2cBus;

/// Bits a slot without a sensor occupies in a values response.
pub const ABSENT_SENSOR_WIDTH: u32 = 10;

/// Width of an analog reading.
pub const ANALOG_WIDTH: u32 = 10;

/// Width of a colour reading.
pub const COLOUR_WIDTH: u32 = 3;

/// Sensor type codes sent in the setup message.
pub mod type_code {
    pub const NONE: u8 = 0;
    /// Raw analog input; also the NXT light sensor with its floodlight off.
    pub const RAW: u8 = 0;
    /// NXT light sensor with the floodlight on (`D0_M | D0_S`).
    pub const LIGHT_ON: u8 = 0x01 | 0x02;
    pub const TOUCH: u8 = 32;
    pub const COLOUR_FULL: u8 = 36;
    pub const I2C: u8 = 41;
    pub const I2C_9V: u8 = 42;
    pub const TOUCH_DEBOUNCED: u8 = 69;
}

/// Per-kind encode/decode hooks used when building and reading messages.
pub trait DeviceCodec {
    /// Code sent for this slot in the setup message.
    fn type_code(&self) -> u8;

    /// Configuration bits appended to the setup message.
    fn encode_setup(&self, buf: &mut BitBuffer) -> Result<()>;

    /// Bits appended to every values request.
    fn encode_request(&self, buf: &mut BitBuffer) -> Result<()>;

    /// Read this sensor's value from a values response.
    fn decode_value(&self, buf: &mut BitBuffer) -> Result<SensorValue>;
}

/// What is plugged into a sensor port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorKind {
    Touch,
    TouchDebounced,
    Light {
        #[serde(default)]
        floodlight: bool,
    },
    Sound,
    Colour,
    Ultrasonic,
    I2c(I2cBus),
    I2c9v(I2cBus),
}

impl SensorKind {
    /// The I2C bus behind this sensor, if it runs in I2C mode.
    pub fn i2c_bus(&self) -> Option<I2cBus> {
        match self {
            Self::Ultrasonic => Some(I2cBus::ultrasonic()),
            Self::I2c(bus) | Self::I2c9v(bus) => Some(bus.clone()),
            _ => None,
        }
    }

    /// True for the touch sensor variants.
    pub fn is_touch(&self) -> bool {
        matches!(self, Self::Touch | Self::TouchDebounced)
    }
}

impl DeviceCodec for SensorKind {
    fn type_code(&self) -> u8 {
        match self {
            Self::Touch => type_code::TOUCH,
            Self::TouchDebounced => type_code::TOUCH_DEBOUNCED,
            Self::Light { floodlight: true } => type_code::LIGHT_ON,
            Self::Light { floodlight: false } | Self::Sound => type_code::RAW,
            Self::Colour => type_code::COLOUR_FULL,
            Self::Ultrasonic | Self::I2c(_) => type_code::I2C,
            Self::I2c9v(_) => type_code::I2C_9V,
        }
    }

    fn encode_setup(&self, buf: &mut BitBuffer) -> Result<()> {
        match self.i2c_bus() {
            Some(bus) => bus.encode_setup(buf),
            None => Ok(()),
        }
    }

    fn encode_request(&self, buf: &mut BitBuffer) -> Result<()> {
        match self.i2c_bus() {
            Some(bus) => bus.encode_request(buf),
            None => Ok(()),
        }
    }

    fn decode_value(&self, buf: &mut BitBuffer) -> Result<SensorValue> {
        let value = match self {
            Self::Touch | Self::TouchDebounced => SensorValue::Touch(buf.take(1)? == 1),
            Self::Light { .. } => {
                let raw = buf.take(ANALOG_WIDTH)? as i32;
                SensorValue::Light((1000 - raw) / 10)
            }
            Self::Sound => SensorValue::Sound((buf.take(ANALOG_WIDTH)? / 10) as u16),
            Self::Colour => SensorValue::Colour(Colour::from_code(buf.take(COLOUR_WIDTH)? as u8)),
            Self::Ultrasonic => {
                let readings = I2cBus::ultrasonic().decode_value(buf)?;
                let distance = readings
                    .first()
                    .and_then(|reading| reading.as_ref())
                    .and_then(|bytes| bytes.first().copied());
                SensorValue::Distance(distance)
            }
            Self::I2c(bus) | Self::I2c9v(bus) => SensorValue::I2c(bus.decode_value(buf)?),
        };
        tracing::trace!(?value, "decoded sensor value");
        Ok(value)
    }
}

/// Decode one slot of a values response. Absent sensors skip their padding.
pub fn decode_sensor_value(
    buf: &mut BitBuffer,
    sensor: Option<&SensorKind>,
) -> Result<Option<SensorValue>> {
    match sensor {
        Some(kind) => kind.decode_value(buf).map(Some),
        None => {
            buf.take(ABSENT_SENSOR_WIDTH)?;
            Ok(None)
        }
    }
}

/// A decoded sensor reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SensorValue {
    /// Pressed when true.
    Touch(bool),
    /// Reflected light, higher is brighter.
    Light(i32),
    /// Sound level.
    Sound(u16),
    Colour(Colour),
    /// Distance in centimetres; `None` when the sensor did not answer.
    Distance(Option<u8>),
    /// Bytes read from each device, `None` for devices that failed.
    I2c(Vec<Option<Vec<u8>>>),
}

/// Colours reported by the NXT colour sensor in full mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Colour {
    Black,
    Blue,
    Green,
    Yellow,
    Red,
    White,
    Unknown(u8),
}

impl Colour {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Black,
            2 => Self::Blue,
            3 => Self::Green,
            4 => Self::Yellow,
            5 => Self::Red,
            6 => Self::White,
            other => Self::Unknown(other),
        }
    }
}
