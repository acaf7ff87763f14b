//! End-to-end exchanges against a simulated board on a mock link.

use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brickpi_codec::{BitBuffer, SensorKind, SensorValue};
use brickpi_frame::{
    decode_request, encode_response, Request, CHANGE_UART_ADDRESS, CONFIGURE_SENSORS,
    EMERGENCY_STOP, READ_SENSOR_VALUES, SET_COMMUNICATION_TIMEOUT,
};
use brickpi_link::{Board, BoardConfig, Exchanger, LinkConfig, LinkError};
use brickpi_transport::{MockLink, Reply};
use bytes::BytesMut;

fn fast() -> LinkConfig {
    LinkConfig {
        response_timeout: Duration::from_millis(25),
        poll_interval: Duration::from_millis(1),
        ..LinkConfig::default()
    }
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_response(payload, &mut buf).expect("payload should fit");
    buf.to_vec()
}

fn parse(written: &[u8]) -> Request {
    decode_request(&mut BytesMut::from(written))
        .expect("host frames should be valid")
        .expect("host frames should be complete")
}

/// A board that answers every request with `answer(request_number, request)`.
fn simulated<F>(mut answer: F) -> MockLink
where
    F: FnMut(u32, &Request) -> Reply + Send + 'static,
{
    let mut seen = 0;
    MockLink::new(move |written| {
        seen += 1;
        answer(seen, &parse(written))
    })
}

#[test]
fn fifth_attempt_succeeds() {
    let link = simulated(|seen, request| {
        if seen < 5 {
            Reply::Silence
        } else {
            Reply::bytes(frame(&[request.command, 0x33]))
        }
    });
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    let response = exchanger.send(1, READ_SENSOR_VALUES, &[0x00]).unwrap();
    assert_eq!(response.data(), &[0x33]);
    assert_eq!(link.written().len(), 5);
    assert_eq!(link.clear_count(), 5);
}

#[test]
fn four_write_failures_then_success() {
    let link = MockLink::scripted([
        Reply::WriteFailure(ErrorKind::BrokenPipe),
        Reply::WriteFailure(ErrorKind::BrokenPipe),
        Reply::WriteFailure(ErrorKind::BrokenPipe),
        Reply::WriteFailure(ErrorKind::BrokenPipe),
        Reply::bytes(frame(&[READ_SENSOR_VALUES, 0x33])),
    ]);
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    let response = exchanger.send(1, READ_SENSOR_VALUES, &[0x00]).unwrap();
    assert_eq!(response.data(), &[0x33]);
    assert_eq!(link.written().len(), 5);
}

#[test]
fn four_read_failures_then_success() {
    let link = simulated(|seen, request| {
        if seen < 5 {
            Reply::ReadFailure(ErrorKind::Other)
        } else {
            Reply::bytes(frame(&[request.command, 0x44]))
        }
    });
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    let response = exchanger.send(2, READ_SENSOR_VALUES, &[]).unwrap();
    assert_eq!(response.data(), &[0x44]);
    assert_eq!(link.written().len(), 5);
}

#[test]
fn one_read_failure_then_good_reply() {
    let link = MockLink::scripted([
        Reply::ReadFailure(ErrorKind::Other),
        Reply::bytes(frame(&[CONFIGURE_SENSORS])),
    ]);
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    exchanger.send(1, CONFIGURE_SENSORS, &[0, 0]).unwrap();
    assert_eq!(link.written().len(), 2);
}

#[test]
fn persistent_read_failures_exhaust_retries() {
    let link = simulated(|_, _| Reply::ReadFailure(ErrorKind::BrokenPipe));
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    match exchanger.send(1, READ_SENSOR_VALUES, &[]).unwrap_err() {
        LinkError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 5);
            match *last {
                LinkError::TransportRead(err) => assert_eq!(err.kind(), ErrorKind::BrokenPipe),
                other => panic!("unexpected cause: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(link.written().len(), 5);
}

#[test]
fn persistent_checksum_faults_exhaust_retries() {
    let link = simulated(|_, request| {
        let mut bytes = frame(&[request.command, 0x10]);
        bytes[0] = bytes[0].wrapping_add(1);
        Reply::bytes(bytes)
    });
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    match exchanger.send(2, CONFIGURE_SENSORS, &[0, 0]).unwrap_err() {
        LinkError::RetriesExhausted {
            address,
            command,
            attempts,
            last,
        } => {
            assert_eq!((address, command, attempts), (2, CONFIGURE_SENSORS, 5));
            assert!(matches!(*last, LinkError::ChecksumMismatch { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(link.written().len(), 5);
}

#[test]
fn checksum_fault_then_good_reply() {
    let link = simulated(|seen, request| {
        let mut bytes = frame(&[request.command]);
        if seen == 1 {
            bytes[0] ^= 0x40;
        }
        Reply::bytes(bytes)
    });
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    exchanger.send(1, SET_COMMUNICATION_TIMEOUT, &[0x10, 0x27, 0, 0]).unwrap();
    assert_eq!(link.written().len(), 2);
}

#[test]
fn trickled_reply_reassembles() {
    let link = simulated(|_, request| Reply::trickle(&frame(&[request.command, 1, 2, 3, 4])));
    let mut exchanger = Exchanger::with_config(link, fast()).unwrap();

    let response = exchanger.send(1, READ_SENSOR_VALUES, &[]).unwrap();
    assert_eq!(response.data(), &[1, 2, 3, 4]);
}

#[test]
fn reply_split_at_every_point() {
    let wire = frame(&[READ_SENSOR_VALUES, 0xDE, 0xAD, 0xBE, 0xEF]);
    for split in 1..wire.len() {
        let (head, tail) = wire.split_at(split);
        let link = MockLink::scripted([Reply::Chunks(vec![head.to_vec(), tail.to_vec()])]);
        let mut exchanger = Exchanger::with_config(link, fast()).unwrap();

        let response = exchanger.send(1, READ_SENSOR_VALUES, &[]).unwrap();
        assert_eq!(response.data(), &[0xDE, 0xAD, 0xBE, 0xEF], "split at {split}");
    }
}

#[test]
fn stale_input_is_dropped_before_sending() {
    let link = simulated(|_, request| Reply::bytes(frame(&[request.command, 0x02])));
    link.inject(frame(&[READ_SENSOR_VALUES, 0x01]));
    let mut exchanger = Exchanger::with_config(link.clone(), fast()).unwrap();

    let response = exchanger.send(1, READ_SENSOR_VALUES, &[]).unwrap();
    assert_eq!(response.data(), &[0x02]);
    assert_eq!(link.pending_input(), 0);
}

#[test]
fn stray_frames_are_reported_and_skipped() {
    let link = simulated(|_, request| {
        let mut wire = frame(&[EMERGENCY_STOP]);
        wire.extend(frame(&[0x55, 0x01]));
        wire.extend(frame(&[request.command, 0x07]));
        Reply::bytes(wire)
    });
    let mut exchanger = Exchanger::with_config(link, fast()).unwrap();

    let response = exchanger.send(1, READ_SENSOR_VALUES, &[]).unwrap();
    assert_eq!(response.data(), &[0x07]);

    let reports = exchanger.take_unsolicited();
    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0], LinkError::UnexpectedResponse(EMERGENCY_STOP)));
    assert!(matches!(reports[1], LinkError::UnknownResponseCode(0x55)));
}

/// Values payload for controller 1: motor on slot 0 at encoder 100, touch
/// sensor pressed on slot 0, nothing on slot 1.
fn first_controller_values() -> Vec<u8> {
    let mut buf = BitBuffer::new();
    buf.push(8, u32::from(READ_SENSOR_VALUES)).unwrap();
    buf.push(5, 8).unwrap();
    buf.push(5, 1).unwrap();
    buf.push(8, 200).unwrap();
    buf.push(1, 0).unwrap();
    buf.push(1, 1).unwrap();
    buf.push(10, 0).unwrap();
    buf.into_bytes()
}

/// Values payload for controller 2: motor on slot 1 at encoder -3,
/// ultrasonic on slot 0 reading 42 cm, nothing on slot 1.
fn second_controller_values() -> Vec<u8> {
    let mut buf = BitBuffer::new();
    buf.push(8, u32::from(READ_SENSOR_VALUES)).unwrap();
    buf.push(5, 1).unwrap();
    buf.push(5, 3).unwrap();
    buf.push(1, 0).unwrap();
    buf.push(3, 7).unwrap();
    buf.push(1, 1).unwrap();
    buf.push(8, 42).unwrap();
    buf.push(10, 0).unwrap();
    buf.into_bytes()
}

fn board_link(log: Arc<Mutex<Vec<(u8, u8)>>>) -> MockLink {
    simulated(move |_, request| {
        log.lock().unwrap().push((request.address, request.command));
        let payload = match (request.address, request.command) {
            (1, READ_SENSOR_VALUES) => first_controller_values(),
            (2, READ_SENSOR_VALUES) => second_controller_values(),
            (1, CHANGE_UART_ADDRESS) => vec![CHANGE_UART_ADDRESS, request.data[0]],
            (0, _) => return Reply::Silence,
            (_, command) => vec![command],
        };
        Reply::bytes(frame(&payload))
    })
}

fn configured_board(link: &MockLink) -> Board<MockLink> {
    let config = BoardConfig::from_json(
        r#"{
            "sensors": [
                { "port": 0, "sensor": { "kind": "touch" } },
                { "port": 2, "sensor": { "kind": "ultrasonic" } }
            ],
            "motors": [0, 3]
        }"#,
    )
    .unwrap();
    let mut board = Board::new(Exchanger::with_config(link.clone(), fast()).unwrap()).unwrap();
    board.apply_config(&config).unwrap();
    board
}

#[test]
fn board_poll_updates_sensors_and_encoders() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let link = board_link(log.clone());
    let mut board = configured_board(&link);
    board.set_motor_speed(0, 200).unwrap();

    board.update_values().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (1, CONFIGURE_SENSORS),
            (1, READ_SENSOR_VALUES),
            (2, CONFIGURE_SENSORS),
            (2, READ_SENSOR_VALUES),
        ]
    );
    assert_eq!(board.sensor_value(0).unwrap(), Some(&SensorValue::Touch(true)));
    assert_eq!(board.sensor_value(1).unwrap(), None);
    assert_eq!(
        board.sensor_value(2).unwrap(),
        Some(&SensorValue::Distance(Some(42)))
    );
    assert_eq!(board.motor(0).unwrap().unwrap().encoder(), Some(100));
    assert_eq!(board.motor(3).unwrap().unwrap().encoder(), Some(-3));
    assert!(board.motor(1).unwrap().is_none());

    // Setup only goes out again after a change.
    board.update_values().unwrap();
    assert_eq!(log.lock().unwrap().len(), 6);

    let snapshot = board.snapshot();
    assert_eq!(snapshot.sensors.len(), 2);
    assert_eq!(snapshot.motors.len(), 2);
    assert_eq!(snapshot.sensors[1].port, "S3");
    assert_eq!(snapshot.motors[1].port, "MD");
}

#[test]
fn emergency_stop_zeroes_motors_and_broadcasts() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let link = board_link(log);
    let mut board = configured_board(&link);
    board.set_motor_speed(0, 150).unwrap();
    board.set_motor_speed(3, -90).unwrap();

    board.emergency_stop().unwrap();

    assert_eq!(board.motor(0).unwrap().unwrap().requested_speed(), 0);
    assert_eq!(board.motor(3).unwrap().unwrap().requested_speed(), 0);
    let written = link.written();
    assert_eq!(written.last().unwrap(), &vec![0x00, 0x05, 0x01, EMERGENCY_STOP]);
}

#[test]
fn communication_timeout_goes_to_both_controllers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let link = board_link(log.clone());
    let mut board = configured_board(&link);

    board
        .set_communication_timeout(Duration::from_millis(10_000))
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![(1, SET_COMMUNICATION_TIMEOUT), (2, SET_COMMUNICATION_TIMEOUT)]
    );
}

#[test]
fn change_address_requires_pressed_touch_sensor() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let link = board_link(log);
    let mut board = configured_board(&link);

    assert!(matches!(
        board.change_uart_address(7),
        Err(LinkError::Precondition(_))
    ));
    assert!(matches!(
        board.change_uart_address(0),
        Err(LinkError::InvalidAddressRange(0))
    ));

    board.update_values().unwrap();
    assert_eq!(board.change_uart_address(7).unwrap(), 7);
    assert_eq!(board.controllers()[0].address(), 7);
}

#[test]
fn change_address_rejects_broadcast_confirmation() {
    let link = simulated(|_, request| {
        let payload = match (request.address, request.command) {
            (1, READ_SENSOR_VALUES) => first_controller_values(),
            (2, READ_SENSOR_VALUES) => second_controller_values(),
            (_, CHANGE_UART_ADDRESS) => vec![CHANGE_UART_ADDRESS, 0],
            (_, command) => vec![command],
        };
        Reply::bytes(frame(&payload))
    });
    let mut board = configured_board(&link);
    board.update_values().unwrap();

    assert!(matches!(
        board.change_uart_address(7),
        Err(LinkError::InvalidAddressRange(0))
    ));
    assert_eq!(board.controllers()[0].address(), 1);
}

#[test]
fn invalid_ports_fail_before_any_io() {
    let link = MockLink::silent();
    let mut board = Board::new(Exchanger::with_config(link.clone(), fast()).unwrap()).unwrap();

    assert!(matches!(
        board.add_sensor(4, SensorKind::Touch),
        Err(LinkError::InvalidPort { kind: "sensor", port: 4, max: 3 })
    ));
    assert!(matches!(
        board.add_motor(9),
        Err(LinkError::InvalidPort { kind: "motor", .. })
    ));
    assert!(matches!(
        board.set_motor_speed(1, 100),
        Err(LinkError::Precondition(_))
    ));
    assert!(link.written().is_empty());
}
