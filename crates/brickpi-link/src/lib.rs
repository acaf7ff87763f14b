//! Host-side driver for the BrickPi: retrying exchanges and the board model.
//!
//! [`Exchanger`] turns the lossy half-duplex UART into reliable
//! request/response calls: it clears stale input, writes the request, waits
//! for the reply whose first byte echoes the command, and resends on
//! checksum faults or timeouts. [`Board`] sits on top and keeps the state of
//! the two controllers: which sensors are plugged in, motor speeds, the last
//! encoder and sensor readings.
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> brickpi_link::Result<()> {
//! use brickpi_link::{Board, Exchanger, LinkConfig};
//! use brickpi_codec::SensorKind;
//!
//! let exchanger = Exchanger::open("/dev/ttyAMA0", 500_000, LinkConfig::default())?;
//! let mut board = Board::new(exchanger)?;
//! board.add_sensor(0, SensorKind::Touch)?;
//! board.add_motor(0)?;
//! board.set_motor_speed(0, 200)?;
//! board.update_values()?;
//! println!("{:?}", board.sensor_value(0)?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod exchanger;
pub mod pending;

#[cfg(feature = "async")]
pub mod async_exchanger;

pub use board::{
    Board, BoardSnapshot, MotorReading, SensorReading, CONTROLLER_ADDRESSES, MOTOR_PORTS,
    MOTOR_PORT_NAMES, SENSOR_PORTS, SENSOR_PORT_NAMES,
};
pub use config::{
    BoardConfig, LinkConfig, LinkOverrides, SensorAssignment, DEFAULT_BAUD_RATE,
    DEFAULT_COMMUNICATION_TIMEOUT, DEFAULT_SERIAL_PATH,
};
pub use controller::Controller;
pub use error::{LinkError, Result};
pub use exchanger::Exchanger;
pub use pending::{ExchangeKey, PendingExchange, PendingTable};

#[cfg(feature = "async")]
pub use async_exchanger::AsyncExchanger;
