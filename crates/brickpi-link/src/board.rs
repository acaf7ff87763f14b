//! The whole board: two controllers, four sensor ports and four motor ports.
//!
//! Port `p` lives on controller `p / 2`, slot `p % 2`. Controllers are always
//! talked to in order (first, then second) over the shared link.

use std::time::Duration;

use brickpi_codec::{MotorState, SensorKind, SensorValue, SLOTS_PER_CONTROLLER};
use brickpi_frame::{BROADCAST_ADDRESS, CHANGE_UART_ADDRESS, EMERGENCY_STOP};
use brickpi_transport::SerialLink;
use serde::Serialize;

use crate::config::BoardConfig;
use crate::controller::Controller;
use crate::error::{LinkError, Result};
use crate::exchanger::Exchanger;

/// Number of sensor ports (S1 to S4).
pub const SENSOR_PORTS: u8 = 4;

/// Number of motor ports (MA to MD).
pub const MOTOR_PORTS: u8 = 4;

/// Factory UART addresses of the two controllers.
pub const CONTROLLER_ADDRESSES: [u8; 2] = [1, 2];

/// Sensor port names, indexed by port number.
pub const SENSOR_PORT_NAMES: [&str; SENSOR_PORTS as usize] = ["S1", "S2", "S3", "S4"];

/// Motor port names, indexed by port number.
pub const MOTOR_PORT_NAMES: [&str; MOTOR_PORTS as usize] = ["MA", "MB", "MC", "MD"];

/// Driver for a BrickPi on one serial link.
pub struct Board<L> {
    exchanger: Exchanger<L>,
    controllers: [Controller; 2],
}

impl<L: SerialLink> Board<L> {
    /// A board with controllers at the factory addresses.
    pub fn new(exchanger: Exchanger<L>) -> Result<Self> {
        Self::with_addresses(exchanger, CONTROLLER_ADDRESSES)
    }

    pub fn with_addresses(exchanger: Exchanger<L>, addresses: [u8; 2]) -> Result<Self> {
        if addresses[0] == addresses[1] {
            return Err(LinkError::InvalidAddressRange(addresses[1]));
        }
        Ok(Self {
            exchanger,
            controllers: [Controller::new(addresses[0])?, Controller::new(addresses[1])?],
        })
    }

    /// Replace the sensor and motor layout with the one in `config`.
    pub fn apply_config(&mut self, config: &BoardConfig) -> Result<()> {
        config.validate()?;

        for port in 0..SENSOR_PORTS {
            self.remove_sensor(port)?;
        }
        for assignment in &config.sensors {
            self.add_sensor(assignment.port, assignment.sensor.clone())?;
        }

        for port in 0..MOTOR_PORTS {
            if !config.motors.contains(&port) {
                let (controller, slot) = locate("motor", port, MOTOR_PORTS)?;
                self.controllers[controller].detach_motor(slot)?;
            }
        }
        for port in &config.motors {
            self.add_motor(*port)?;
        }

        tracing::debug!(
            sensors = config.sensors.len(),
            motors = config.motors.len(),
            "applied board config"
        );
        Ok(())
    }

    pub fn add_sensor(&mut self, port: u8, sensor: SensorKind) -> Result<()> {
        let (controller, slot) = locate("sensor", port, SENSOR_PORTS)?;
        self.controllers[controller].set_sensor(slot, Some(sensor))
    }

    pub fn remove_sensor(&mut self, port: u8) -> Result<()> {
        let (controller, slot) = locate("sensor", port, SENSOR_PORTS)?;
        self.controllers[controller].set_sensor(slot, None)
    }

    pub fn sensor(&self, port: u8) -> Result<Option<&SensorKind>> {
        let (controller, slot) = locate("sensor", port, SENSOR_PORTS)?;
        self.controllers[controller].sensor(slot)
    }

    /// Last value read from the sensor on `port`.
    pub fn sensor_value(&self, port: u8) -> Result<Option<&SensorValue>> {
        let (controller, slot) = locate("sensor", port, SENSOR_PORTS)?;
        self.controllers[controller].reading(slot)
    }

    pub fn add_motor(&mut self, port: u8) -> Result<&mut MotorState> {
        let (controller, slot) = locate("motor", port, MOTOR_PORTS)?;
        self.controllers[controller].attach_motor(slot)
    }

    pub fn motor(&self, port: u8) -> Result<Option<&MotorState>> {
        let (controller, slot) = locate("motor", port, MOTOR_PORTS)?;
        self.controllers[controller].motor(slot)
    }

    /// Set the speed sent with the next poll.
    pub fn set_motor_speed(&mut self, port: u8, speed: i32) -> Result<()> {
        let (controller, slot) = locate("motor", port, MOTOR_PORTS)?;
        match self.controllers[controller].motor_mut(slot)? {
            Some(motor) => {
                motor.set_speed(speed);
                Ok(())
            }
            None => Err(LinkError::Precondition(format!(
                "no motor attached to {}",
                MOTOR_PORT_NAMES[port as usize]
            ))),
        }
    }

    pub fn controllers(&self) -> &[Controller; 2] {
        &self.controllers
    }

    pub fn exchanger(&self) -> &Exchanger<L> {
        &self.exchanger
    }

    pub fn exchanger_mut(&mut self) -> &mut Exchanger<L> {
        &mut self.exchanger
    }

    /// Send the communication timeout to each controller in turn.
    pub fn set_communication_timeout(&mut self, timeout: Duration) -> Result<()> {
        for controller in &self.controllers {
            controller.set_communication_timeout(&mut self.exchanger, timeout)?;
        }
        Ok(())
    }

    /// Zero every motor and tell all controllers to stop immediately.
    pub fn emergency_stop(&mut self) -> Result<()> {
        for controller in &mut self.controllers {
            for slot in 0..SLOTS_PER_CONTROLLER {
                if let Some(motor) = controller.motor_mut(slot)? {
                    motor.set_speed(0);
                }
            }
        }
        tracing::warn!("emergency stop");
        self.exchanger.broadcast(EMERGENCY_STOP, &[])
    }

    /// Send the sensor setup to each controller in turn.
    pub fn configure_sensors(&mut self) -> Result<()> {
        for controller in &mut self.controllers {
            controller.configure_sensors(&mut self.exchanger)?;
        }
        Ok(())
    }

    /// Poll both controllers: motor commands out, encoders and sensors in.
    pub fn update_values(&mut self) -> Result<()> {
        for controller in &mut self.controllers {
            controller.update_values(&mut self.exchanger)?;
        }
        Ok(())
    }

    /// Move the first controller to a new UART address.
    ///
    /// The firmware only accepts this while the touch sensor on S1 is held
    /// down, so a touch sensor must be configured there and its last reading
    /// must be pressed. Returns the address the controller confirmed.
    pub fn change_uart_address(&mut self, address: u8) -> Result<u8> {
        self.check_new_address(address)?;

        let s1 = &self.controllers[0];
        if !s1.sensor(0)?.is_some_and(SensorKind::is_touch) {
            return Err(LinkError::Precondition(
                "connect and configure a touch sensor on S1 first".to_string(),
            ));
        }
        if s1.reading(0)? != Some(&SensorValue::Touch(true)) {
            return Err(LinkError::Precondition(
                "press and hold the touch sensor on S1".to_string(),
            ));
        }

        let response = self
            .exchanger
            .send(s1.address(), CHANGE_UART_ADDRESS, &[address])?;
        let confirmed = *response.data().first().ok_or(LinkError::MalformedReply {
            command: CHANGE_UART_ADDRESS,
            message: "missing new address".to_string(),
        })?;
        self.check_new_address(confirmed)?;

        tracing::info!(from = s1.address(), to = confirmed, "changed UART address");
        self.controllers[0].set_address(confirmed);
        Ok(confirmed)
    }

    /// The first controller may not move to broadcast or onto the second.
    fn check_new_address(&self, address: u8) -> Result<()> {
        if address == BROADCAST_ADDRESS || address == self.controllers[1].address() {
            return Err(LinkError::InvalidAddressRange(address));
        }
        Ok(())
    }

    /// Serializable view of every configured port.
    pub fn snapshot(&self) -> BoardSnapshot {
        let mut snapshot = BoardSnapshot::default();
        for (index, controller) in self.controllers.iter().enumerate() {
            for slot in 0..SLOTS_PER_CONTROLLER {
                let port = index * SLOTS_PER_CONTROLLER + slot;
                if let Ok(Some(kind)) = controller.sensor(slot) {
                    snapshot.sensors.push(SensorReading {
                        port: SENSOR_PORT_NAMES[port],
                        sensor: kind.clone(),
                        value: controller.reading(slot).ok().flatten().cloned(),
                    });
                }
                if let Ok(Some(motor)) = controller.motor(slot) {
                    snapshot.motors.push(MotorReading {
                        port: MOTOR_PORT_NAMES[port],
                        state: motor.clone(),
                    });
                }
            }
        }
        snapshot
    }
}

/// Point-in-time view of the board state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardSnapshot {
    pub sensors: Vec<SensorReading>,
    pub motors: Vec<MotorReading>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub port: &'static str,
    pub sensor: SensorKind,
    pub value: Option<SensorValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MotorReading {
    pub port: &'static str,
    #[serde(flatten)]
    pub state: MotorState,
}

/// Map a port number to (controller index, slot).
pub fn locate(kind: &'static str, port: u8, ports: u8) -> Result<(usize, usize)> {
    if port >= ports {
        return Err(LinkError::InvalidPort {
            kind,
            port,
            max: ports - 1,
        });
    }
    let port = port as usize;
    Ok((port / SLOTS_PER_CONTROLLER, port % SLOTS_PER_CONTROLLER))
}
