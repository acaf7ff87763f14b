/// Errors raised while packing or unpacking device payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A single field may be at most 32 bits wide.
    #[error("bit field too wide ({width} bits, max {max})")]
    WidthTooLarge { width: u32, max: u32 },

    /// The buffer ended before the requested field.
    #[error("payload truncated (needed bit {needed}, have {available} bits)")]
    Truncated { needed: usize, available: usize },

    /// An I2C bus already holds the maximum number of devices.
    #[error("I2C bus is full ({max} devices)")]
    I2cBusFull { max: usize },

    /// An I2C sensor was configured without any device.
    #[error("I2C bus has no devices")]
    EmptyI2cBus,

    /// An I2C transfer does not fit its 4-bit length field.
    #[error("I2C transfer too long ({len} bytes, max {max})")]
    I2cTransferTooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
