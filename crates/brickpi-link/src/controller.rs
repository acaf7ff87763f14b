//! One of the two microcontrollers on the board: two motor slots and two
//! sensor slots behind a single UART address.

use std::time::{Duration, Instant};

use brickpi_codec::{
    decode_values_response, encode_sensor_setup, encode_values_request, MotorState, SensorKind,
    SensorValue, ValuesReport, SLOTS_PER_CONTROLLER,
};
use brickpi_frame::{
    BROADCAST_ADDRESS, CONFIGURE_SENSORS, READ_SENSOR_VALUES, SET_COMMUNICATION_TIMEOUT,
};
use brickpi_transport::SerialLink;

use crate::error::{LinkError, Result};
use crate::exchanger::Exchanger;

/// Host-side model of one controller.
#[derive(Debug, Clone)]
pub struct Controller {
    address: u8,
    sensors: [Option<SensorKind>; SLOTS_PER_CONTROLLER],
    readings: [Option<SensorValue>; SLOTS_PER_CONTROLLER],
    motors: [Option<MotorState>; SLOTS_PER_CONTROLLER],
    sensors_dirty: bool,
}

impl Controller {
    /// A controller at `address`. The broadcast address is rejected.
    pub fn new(address: u8) -> Result<Self> {
        if address == BROADCAST_ADDRESS {
            return Err(LinkError::InvalidAddressRange(address));
        }
        Ok(Self {
            address,
            sensors: [None, None],
            readings: [None, None],
            motors: [None, None],
            sensors_dirty: false,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Plug a sensor into `slot` (or unplug it with `None`). The new setup is
    /// sent before the next values poll.
    pub fn set_sensor(&mut self, slot: usize, sensor: Option<SensorKind>) -> Result<()> {
        let slot = check_slot(slot)?;
        if self.sensors[slot] != sensor {
            self.sensors[slot] = sensor;
            self.readings[slot] = None;
            self.sensors_dirty = true;
        }
        Ok(())
    }

    pub fn sensor(&self, slot: usize) -> Result<Option<&SensorKind>> {
        Ok(self.sensors[check_slot(slot)?].as_ref())
    }

    /// Last value read from the sensor in `slot`.
    pub fn reading(&self, slot: usize) -> Result<Option<&SensorValue>> {
        Ok(self.readings[check_slot(slot)?].as_ref())
    }

    /// Attach a motor to `slot`, keeping any existing state.
    pub fn attach_motor(&mut self, slot: usize) -> Result<&mut MotorState> {
        let slot = check_slot(slot)?;
        Ok(self.motors[slot].get_or_insert_with(MotorState::new))
    }

    pub fn detach_motor(&mut self, slot: usize) -> Result<Option<MotorState>> {
        Ok(self.motors[check_slot(slot)?].take())
    }

    pub fn motor(&self, slot: usize) -> Result<Option<&MotorState>> {
        Ok(self.motors[check_slot(slot)?].as_ref())
    }

    pub fn motor_mut(&mut self, slot: usize) -> Result<Option<&mut MotorState>> {
        Ok(self.motors[check_slot(slot)?].as_mut())
    }

    /// True when the sensor setup changed since it was last sent.
    pub fn needs_configuration(&self) -> bool {
        self.sensors_dirty
    }

    /// Tell the controller how long to keep motors running without traffic.
    pub fn set_communication_timeout<L: SerialLink>(
        &self,
        exchanger: &mut Exchanger<L>,
        timeout: Duration,
    ) -> Result<()> {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        exchanger.send(self.address, SET_COMMUNICATION_TIMEOUT, &millis.to_le_bytes())?;
        Ok(())
    }

    /// Send the sensor type codes and setup bits.
    pub fn configure_sensors<L: SerialLink>(&mut self, exchanger: &mut Exchanger<L>) -> Result<()> {
        let setup = encode_sensor_setup(self.sensor_slots())?;
        tracing::debug!(
            address = self.address,
            len = setup.as_bytes().len(),
            "configuring sensors"
        );
        exchanger.send(self.address, CONFIGURE_SENSORS, setup.as_bytes())?;
        self.sensors_dirty = false;
        Ok(())
    }

    /// Send motor commands and read back encoders and sensor values.
    ///
    /// A changed sensor setup is sent first.
    pub fn update_values<L: SerialLink>(
        &mut self,
        exchanger: &mut Exchanger<L>,
    ) -> Result<ValuesReport> {
        if self.sensors_dirty {
            self.configure_sensors(exchanger)?;
        }

        let [first, second] = &self.motors;
        let request = encode_values_request([first.as_ref(), second.as_ref()], self.sensor_slots())?;
        let response = exchanger.send(self.address, READ_SENSOR_VALUES, request.as_bytes())?;
        let report = decode_values_response(response.payload(), self.sensor_slots())?;

        let now = Instant::now();
        for (motor, encoder) in self.motors.iter_mut().zip(report.encoders) {
            if let Some(motor) = motor {
                motor.record_encoder(encoder, now);
            }
        }
        self.readings = report.sensors.clone();
        Ok(report)
    }

    fn sensor_slots(&self) -> [Option<&SensorKind>; SLOTS_PER_CONTROLLER] {
        let [first, second] = &self.sensors;
        [first.as_ref(), second.as_ref()]
    }
}

fn check_slot(slot: usize) -> Result<usize> {
    if slot >= SLOTS_PER_CONTROLLER {
        return Err(LinkError::InvalidPort {
            kind: "slot",
            port: u8::try_from(slot).unwrap_or(u8::MAX),
            max: SLOTS_PER_CONTROLLER as u8 - 1,
        });
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use brickpi_frame::encode_response;
    use brickpi_transport::{MockLink, Reply};
    use bytes::BytesMut;

    use super::*;
    use crate::config::LinkConfig;

    fn reply(payload: &[u8]) -> Reply {
        let mut buf = BytesMut::new();
        encode_response(payload, &mut buf).unwrap();
        Reply::bytes(buf.to_vec())
    }

    fn exchanger(link: &MockLink) -> Exchanger<MockLink> {
        let config = LinkConfig {
            response_timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(1),
            ..LinkConfig::default()
        };
        Exchanger::with_config(link.clone(), config).unwrap()
    }

    #[test]
    fn broadcast_address_rejected() {
        assert!(matches!(
            Controller::new(0),
            Err(LinkError::InvalidAddressRange(0))
        ));
    }

    #[test]
    fn bad_slot_rejected_before_io() {
        let mut controller = Controller::new(1).unwrap();
        assert!(matches!(
            controller.set_sensor(2, Some(SensorKind::Touch)),
            Err(LinkError::InvalidPort { kind: "slot", port: 2, .. })
        ));
        assert!(controller.attach_motor(7).is_err());
    }

    #[test]
    fn communication_timeout_is_little_endian_millis() {
        let link = MockLink::scripted([reply(&[SET_COMMUNICATION_TIMEOUT])]);
        let mut exchanger = exchanger(&link);
        let controller = Controller::new(1).unwrap();

        controller
            .set_communication_timeout(&mut exchanger, Duration::from_millis(10_000))
            .unwrap();

        let written = link.written();
        assert_eq!(&written[0][3..], &[SET_COMMUNICATION_TIMEOUT, 0x10, 0x27, 0x00, 0x00]);
        assert_eq!(written[0][0], 1);
    }

    #[test]
    fn sensor_change_triggers_setup_before_poll() {
        let link = MockLink::scripted([
            reply(&[CONFIGURE_SENSORS]),
            reply(&[READ_SENSOR_VALUES, 0x00, 0xAC, 0xF8, 0x1F]),
        ]);
        let mut exchanger = exchanger(&link);
        let mut controller = Controller::new(2).unwrap();
        controller
            .set_sensor(0, Some(SensorKind::Ultrasonic))
            .unwrap();
        assert!(controller.needs_configuration());

        let report = controller.update_values(&mut exchanger).unwrap();
        assert_eq!(report.sensors[0], Some(SensorValue::Distance(Some(21))));
        assert_eq!(
            controller.reading(0).unwrap(),
            Some(&SensorValue::Distance(Some(21)))
        );
        assert!(!controller.needs_configuration());

        let written = link.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0][3], CONFIGURE_SENSORS);
        assert_eq!(&written[0][4..], &[0x29, 0x00, 0x0A, 0x08, 0x1C, 0x21, 0x04]);
        assert_eq!(written[1][3], READ_SENSOR_VALUES);
    }

    #[test]
    fn poll_updates_motor_encoder() {
        let link = MockLink::scripted([reply(&[
            READ_SENSOR_VALUES,
            0xE0,
            0x09,
            0x89,
            0xFF,
            0xFF,
            0x1F,
        ])]);
        let mut exchanger = exchanger(&link);
        let mut controller = Controller::new(1).unwrap();
        controller.attach_motor(1).unwrap().set_speed(255);

        controller.update_values(&mut exchanger).unwrap();

        assert_eq!(&link.written()[0][4..], &[0x00, 0xD0, 0x3F]);
        let motor = controller.motor(1).unwrap().unwrap();
        assert_eq!(motor.encoder(), Some(12577));
        assert_eq!(motor.rpm(), 0.0);
    }

    #[test]
    fn unchanged_sensor_does_not_dirty() {
        let mut controller = Controller::new(1).unwrap();
        controller.set_sensor(1, None).unwrap();
        assert!(!controller.needs_configuration());
    }
}
