//! Host-side driver for the BrickPi robotics expansion board.
//!
//! The board carries two microcontrollers behind one UART. This crate
//! re-exports the layers of the driver:
//!
//! - [`transport`]: the serial link trait, a real UART link (`serial`
//!   feature) and a scripted mock (`mock` feature)
//! - [`frame`]: checksummed request/response framing and frame reassembly
//! - [`codec`]: LSB-first bit packing and the motor, sensor and I2C layouts
//! - [`link`]: retrying exchanges and the two-controller board model

/// Re-export transport types.
pub mod transport {
    pub use brickpi_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use brickpi_frame::*;
}

/// Re-export payload codec types.
pub mod codec {
    pub use brickpi_codec::*;
}

/// Re-export exchanger and board types.
pub mod link {
    pub use brickpi_link::*;
}

pub use brickpi_link::{Board, BoardConfig, Exchanger, LinkConfig, LinkError};
