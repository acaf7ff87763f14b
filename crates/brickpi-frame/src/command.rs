//! Command codes understood by the BrickPi firmware.
//!
//! A response echoes the command it answers in its first payload byte.

/// Change a controller's UART address (needs the S1 touch sensor held down).
pub const CHANGE_UART_ADDRESS: u8 = 0x01;

/// Send sensor type codes and per-sensor setup bits.
pub const CONFIGURE_SENSORS: u8 = 0x02;

/// Send motor commands and read encoders and sensor values.
pub const READ_SENSOR_VALUES: u8 = 0x03;

/// Stop all motors.
pub const EMERGENCY_STOP: u8 = 0x04;

/// Set how long a controller keeps motors running without traffic.
pub const SET_COMMUNICATION_TIMEOUT: u8 = 0x05;

/// Destination address every controller listens on.
pub const BROADCAST_ADDRESS: u8 = 0x00;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u8) -> &'static str {
    match code {
        CHANGE_UART_ADDRESS => "CHANGE_UART_ADDRESS",
        CONFIGURE_SENSORS => "CONFIGURE_SENSORS",
        READ_SENSOR_VALUES => "READ_SENSOR_VALUES",
        EMERGENCY_STOP => "EMERGENCY_STOP",
        SET_COMMUNICATION_TIMEOUT => "SET_COMMUNICATION_TIMEOUT",
        _ => "UNKNOWN",
    }
}

/// Returns true if the firmware defines this command code.
pub fn is_known(code: u8) -> bool {
    (CHANGE_UART_ADDRESS..=SET_COMMUNICATION_TIMEOUT).contains(&code)
}
