//! I2C bus descriptors for sensor ports running in I2C mode.
//!
//! Setup layout, per bus:
//!
//! ```text
//! speed:8  device_count-1:3
//! per device: address>>1:7  settings:2
//!             [SAME only] write_len:4  read_len:4  write bytes:8 each
//! ```
//!
//! Devices without [`settings::SAME`] send their lengths and write bytes
//! with every value request instead. Values come back as a success mask
//! (one bit per device) followed by `read_len` bytes for each device whose
//! bit is set.

use serde::{Deserialize, Serialize};

use crate::bits::BitBuffer;
use crate::error::{CodecError, Result};

/// Most devices one sensor port can address.
pub const MAX_I2C_DEVICES: usize = 8;

/// Longest write or read transfer (4-bit length fields).
pub const MAX_TRANSFER_LEN: usize = 15;

/// Device setting flags.
pub mod settings {
    /// Issue an extra clock pulse between the write and the read.
    pub const MID: u8 = 0x01;
    /// Lengths and write bytes are fixed, so they are sent once at setup.
    pub const SAME: u8 = 0x02;
}

/// Bus speed the NXT ultrasonic sensor needs.
pub const ULTRASONIC_SPEED: u8 = 0x0A;
/// 8-bit bus address of the NXT ultrasonic sensor.
pub const ULTRASONIC_ADDRESS: u8 = 0x02;
/// Register holding the ultrasonic distance reading.
pub const ULTRASONIC_DATA_REGISTER: u8 = 0x42;

/// One device on an I2C bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cDevice {
    /// 8-bit bus address; the low bit is dropped on the wire.
    pub address: u8,
    /// [`settings`] flags.
    #[serde(default)]
    pub settings: u8,
    /// Bytes written before each read (usually a register number).
    #[serde(default)]
    pub write: Vec<u8>,
    /// Bytes read back per transfer.
    pub read_len: u8,
}

impl I2cDevice {
    /// A device that reads `read_len` bytes from `register` on every poll.
    pub fn register_reader(address: u8, settings: u8, register: u8, read_len: u8) -> Result<Self> {
        let device = Self {
            address,
            settings,
            write: vec![register],
            read_len,
        };
        device.validate()?;
        Ok(device)
    }

    /// True when the transfer is sent once at setup.
    pub fn is_fixed(&self) -> bool {
        self.settings & settings::SAME != 0
    }

    fn validate(&self) -> Result<()> {
        let longest = self.write.len().max(self.read_len as usize);
        if longest > MAX_TRANSFER_LEN {
            return Err(CodecError::I2cTransferTooLong {
                len: longest,
                max: MAX_TRANSFER_LEN,
            });
        }
        Ok(())
    }

    fn encode_transfer(&self, buf: &mut BitBuffer) -> Result<()> {
        buf.push(4, self.write.len() as u32)?;
        buf.push(4, self.read_len as u32)?;
        for byte in &self.write {
            buf.push(8, *byte as u32)?;
        }
        Ok(())
    }
}

/// Up to eight devices sharing one sensor port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cBus {
    pub speed: u8,
    #[serde(default)]
    devices: Vec<I2cDevice>,
}

impl I2cBus {
    pub fn new(speed: u8) -> Self {
        Self {
            speed,
            devices: Vec::new(),
        }
    }

    /// The single-device bus of an NXT ultrasonic sensor.
    pub fn ultrasonic() -> Self {
        Self {
            speed: ULTRASONIC_SPEED,
            devices: vec![I2cDevice {
                address: ULTRASONIC_ADDRESS,
                settings: settings::MID | settings::SAME,
                write: vec![ULTRASONIC_DATA_REGISTER],
                read_len: 1,
            }],
        }
    }

    /// Register another device. Fails once the bus holds [`MAX_I2C_DEVICES`].
    pub fn add_device(&mut self, device: I2cDevice) -> Result<()> {
        if self.devices.len() == MAX_I2C_DEVICES {
            return Err(CodecError::I2cBusFull {
                max: MAX_I2C_DEVICES,
            });
        }
        device.validate()?;
        self.devices.push(device);
        Ok(())
    }

    pub fn devices(&self) -> &[I2cDevice] {
        &self.devices
    }

    /// Write the bus setup fields.
    pub fn encode_setup(&self, buf: &mut BitBuffer) -> Result<()> {
        self.check()?;
        buf.push(8, self.speed as u32)?;
        buf.push(3, (self.devices.len() - 1) as u32)?;
        for device in &self.devices {
            buf.push(7, (device.address >> 1) as u32)?;
            buf.push(2, device.settings as u32)?;
            if device.is_fixed() {
                device.encode_transfer(buf)?;
            }
        }
        Ok(())
    }

    /// Write the per-poll transfers of devices without fixed settings.
    pub fn encode_request(&self, buf: &mut BitBuffer) -> Result<()> {
        for device in self.devices.iter().filter(|d| !d.is_fixed()) {
            device.encode_transfer(buf)?;
        }
        Ok(())
    }

    /// Read the success mask and the bytes of every device that answered.
    pub fn decode_value(&self, buf: &mut BitBuffer) -> Result<Vec<Option<Vec<u8>>>> {
        self.check()?;
        let mask = buf.take(self.devices.len() as u32)?;

        let mut readings = Vec::with_capacity(self.devices.len());
        for (index, device) in self.devices.iter().enumerate() {
            if mask & (1 << index) == 0 {
                readings.push(None);
                continue;
            }
            let mut bytes = Vec::with_capacity(device.read_len as usize);
            for _ in 0..device.read_len {
                bytes.push(buf.take(8)? as u8);
            }
            readings.push(Some(bytes));
        }
        Ok(readings)
    }

    fn check(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(CodecError::EmptyI2cBus);
        }
        if self.devices.len() > MAX_I2C_DEVICES {
            return Err(CodecError::I2cBusFull {
                max: MAX_I2C_DEVICES,
            });
        }
        self.devices.iter().try_for_each(I2cDevice::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: u8) -> I2cDevice {
        I2cDevice::register_reader(address, settings::SAME, 0x42, 1).unwrap()
    }

    #[test]
    fn ultrasonic_setup_bits() {
        let mut buf = BitBuffer::new();
        I2cBus::ultrasonic().encode_setup(&mut buf).unwrap();
        assert_eq!(buf.as_bytes(), &[0x0A, 0x08, 0x1C, 0x21, 0x04]);
    }

    #[test]
    fn ninth_device_is_rejected() {
        let mut bus = I2cBus::new(0x0A);
        for n in 0..MAX_I2C_DEVICES as u8 {
            bus.add_device(device(n * 2)).unwrap();
        }
        assert_eq!(
            bus.add_device(device(0x40)),
            Err(CodecError::I2cBusFull { max: 8 })
        );
        assert_eq!(bus.devices().len(), MAX_I2C_DEVICES);
    }

    #[test]
    fn devices_accumulate() {
        let mut bus = I2cBus::new(0);
        bus.add_device(device(0x02)).unwrap();
        bus.add_device(device(0x04)).unwrap();
        assert_eq!(bus.devices().len(), 2);
        assert_eq!(bus.devices()[1].address, 0x04);
    }

    #[test]
    fn empty_bus_cannot_encode() {
        let mut buf = BitBuffer::new();
        assert_eq!(
            I2cBus::new(0).encode_setup(&mut buf),
            Err(CodecError::EmptyI2cBus)
        );
    }

    #[test]
    fn long_transfer_rejected() {
        let result = I2cDevice::register_reader(0x02, 0, 0x42, 16);
        assert_eq!(
            result,
            Err(CodecError::I2cTransferTooLong { len: 16, max: 15 })
        );
    }

    #[test]
    fn unfixed_device_sends_transfer_per_request() {
        let mut bus = I2cBus::new(0);
        bus.add_device(I2cDevice::register_reader(0x10, 0, 0x05, 2).unwrap())
            .unwrap();
        bus.add_device(device(0x12)).unwrap();

        let mut setup = BitBuffer::new();
        bus.encode_setup(&mut setup).unwrap();
        // 8 + 3 + (7 + 2) + (7 + 2 + 4 + 4 + 8)
        assert_eq!(setup.write_position(), 45);

        let mut request = BitBuffer::new();
        bus.encode_request(&mut request).unwrap();
        let mut read = BitBuffer::from_bytes(request.into_bytes());
        assert_eq!(read.take(4).unwrap(), 1);
        assert_eq!(read.take(4).unwrap(), 2);
        assert_eq!(read.take(8).unwrap(), 0x05);
    }

    #[test]
    fn failed_devices_read_nothing() {
        let mut bus = I2cBus::new(0);
        bus.add_device(device(0x02)).unwrap();
        bus.add_device(device(0x04)).unwrap();

        let mut wire = BitBuffer::new();
        wire.push(2, 0b10).unwrap();
        wire.push(8, 0x99).unwrap();
        let mut read = BitBuffer::from_bytes(wire.into_bytes());

        let readings = bus.decode_value(&mut read).unwrap();
        assert_eq!(readings, vec![None, Some(vec![0x99])]);
        assert_eq!(read.read_position(), 10);
    }

    #[test]
    fn bus_deserializes_from_json() {
        let bus: I2cBus = serde_json::from_str(
            r#"{"speed": 10, "devices": [{"address": 2, "settings": 3, "write": [66], "read_len": 1}]}"#,
        )
        .unwrap();
        assert_eq!(bus, I2cBus::ultrasonic());
    }
}
