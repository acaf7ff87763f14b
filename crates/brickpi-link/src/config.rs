use std::path::Path;
use std::time::Duration;

use brickpi_codec::SensorKind;
use brickpi_frame::DEFAULT_FRAME_TIMEOUT;
use serde::{Deserialize, Serialize};

use crate::board::{MOTOR_PORTS, SENSOR_PORTS};
use crate::error::{LinkError, Result};

/// Default serial baud rate of the BrickPi UART.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

/// Default serial device on a Raspberry Pi.
pub const DEFAULT_SERIAL_PATH: &str = "/dev/ttyAMA0";

/// Default time a controller keeps motors running without traffic.
pub const DEFAULT_COMMUNICATION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Largest board config file accepted by [`BoardConfig::from_path`].
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Retry and timing policy for request/response exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Sends per exchange before giving up, including the first.
    pub max_attempts: u32,
    /// How long to wait for the matching reply after each send.
    pub response_timeout: Duration,
    /// How long a started frame may take before it is abandoned.
    pub frame_timeout: Duration,
    /// Read timeout applied to the link, bounding each blocking read.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            response_timeout: Duration::from_millis(5000),
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Overrides for [`LinkConfig`] in a board config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkOverrides {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    #[serde(default)]
    pub frame_timeout_ms: Option<u64>,
}

/// A sensor plugged into a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorAssignment {
    /// Sensor port, 0 (S1) to 3 (S4).
    pub port: u8,
    pub sensor: SensorKind,
}

/// Board description loaded from JSON.
///
/// ```json
/// {
///   "serial_path": "/dev/ttyAMA0",
///   "sensors": [{ "port": 0, "sensor": { "kind": "touch" } }],
///   "motors": [1]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    #[serde(default = "default_serial_path")]
    pub serial_path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_communication_timeout_ms")]
    pub communication_timeout_ms: u32,
    #[serde(default)]
    pub link: LinkOverrides,
    #[serde(default)]
    pub sensors: Vec<SensorAssignment>,
    /// Motor ports in use, 0 (MA) to 3 (MD).
    #[serde(default)]
    pub motors: Vec<u8>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            serial_path: default_serial_path(),
            baud_rate: default_baud_rate(),
            communication_timeout_ms: default_communication_timeout_ms(),
            link: LinkOverrides::default(),
            sensors: Vec::new(),
            motors: Vec::new(),
        }
    }
}

impl BoardConfig {
    /// Parse and validate a JSON board description.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON board description from a file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|err| LinkError::Config(format!("{}: {err}", path.display())))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(LinkError::Config(format!(
                "{}: config file too large ({} bytes)",
                path.display(),
                metadata.len()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| LinkError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json(&text)
    }

    /// Check ports and values before anything is sent to the board.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(LinkError::Config("baud_rate must be non-zero".to_string()));
        }
        if self.link.max_attempts == Some(0) {
            return Err(LinkError::Config(
                "link.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut seen = [false; SENSOR_PORTS as usize];
        for assignment in &self.sensors {
            if assignment.port >= SENSOR_PORTS {
                return Err(LinkError::InvalidPort {
                    kind: "sensor",
                    port: assignment.port,
                    max: SENSOR_PORTS - 1,
                });
            }
            if std::mem::replace(&mut seen[assignment.port as usize], true) {
                return Err(LinkError::Config(format!(
                    "sensor port {} assigned twice",
                    assignment.port
                )));
            }
        }
        for port in &self.motors {
            if *port >= MOTOR_PORTS {
                return Err(LinkError::InvalidPort {
                    kind: "motor",
                    port: *port,
                    max: MOTOR_PORTS - 1,
                });
            }
        }
        Ok(())
    }

    /// Link policy with this file's overrides applied.
    pub fn link_config(&self) -> LinkConfig {
        let defaults = LinkConfig::default();
        LinkConfig {
            max_attempts: self.link.max_attempts.unwrap_or(defaults.max_attempts),
            response_timeout: self
                .link
                .response_timeout_ms
                .map_or(defaults.response_timeout, Duration::from_millis),
            frame_timeout: self
                .link
                .frame_timeout_ms
                .map_or(defaults.frame_timeout, Duration::from_millis),
            ..defaults
        }
    }

    pub fn communication_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.communication_timeout_ms))
    }
}

fn default_serial_path() -> String {
    DEFAULT_SERIAL_PATH.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_communication_timeout_ms() -> u32 {
    DEFAULT_COMMUNICATION_TIMEOUT.as_millis() as u32
}
