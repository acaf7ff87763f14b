//! Serial link abstraction for the BrickPi host driver.
//!
//! Everything above this crate talks to the board through [`SerialLink`]:
//! a byte pipe that can also discard stale input and bound how long a read
//! may block.
//!
//! - [`SerialPortLink`] drives a real UART (`serial` feature)
//! - [`MockLink`] is a scripted in-memory link for tests (`mock` feature)

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::SerialLink;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockLink, Reply};

#[cfg(feature = "serial")]
pub use serial::{SerialPortLink, DEFAULT_BAUD_RATE};
