use rovlink::protocol::*;
use rovlink::safety::SupervisorState;

fn sample_heartbeat() -> Heartbeat {
    Heartbeat {
        sequence: 42,
        uptime_ms: 12_345,
        master_enable: true,
        supervisor: SupervisorState::Armed,
        thrusters: (0..6)
            .map(|id| ThrusterStatus {
                id,
                enabled: true,
                command_velocity: 0.25 * f32::from(id),
                measured_velocity: Some(0.2),
                measured_current: Some(1.5),
                online: true,
            })
            .collect(),
        power_board: PowerBoardStatus {
            is_connected: true,
            battery_voltage: 15.9,
            state_of_charge: 78,
            main_switch_enabled: true,
            main_switch_current: 4.2,
            temperature: 31.0,
            switches: (0..9)
                .map(|id| SwitchStatus {
                    id,
                    enabled: id % 2 == 0,
                    measured_voltage: Some(15.9),
                    measured_current: Some(0.3),
                })
                .collect(),
        },
        environment: EnvironmentalReading {
            depth_m: Some(3.2),
            pressure_kpa: Some(132.5),
            temperature_c: Some(11.0),
        },
        lights: [true, false],
        controller_input: None,
        frames_rx: 100,
        frames_tx: 99,
        decode_errors: 1,
    }
}

fn sample_control() -> Control {
    Control {
        master_enable: Some(true),
        thrusters: vec![ThrusterCommand {
            id: 3,
            velocity: -0.5,
            enabled: true,
        }],
        switches: vec![SwitchCommand {
            id: 7,
            enabled: false,
        }],
        lights: vec![LightCommand { id: 1, on: true }],
        controller_input: Some(ControllerInput {
            left_stick: [0.1, -0.9],
            right_stick: [0.0, 0.0],
            left_trigger: 0.3,
            right_trigger: 0.0,
            buttons: ControllerButtons {
                a: true,
                ..ControllerButtons::default()
            },
        }),
    }
}

#[test]
fn test_heartbeat_round_trip() {
    let heartbeat = sample_heartbeat();
    let body = encode_heartbeat(&heartbeat).unwrap();

    match decode(&body).unwrap() {
        Message::Heartbeat(decoded) => assert_eq!(decoded, heartbeat),
        other => panic!("expected heartbeat, got {other:?}"),
    }
}

#[test]
fn test_control_round_trip() {
    let control = sample_control();
    let body = encode_control(&control).unwrap();

    match decode(&body).unwrap() {
        Message::Control(decoded) => assert_eq!(decoded, control),
        other => panic!("expected control, got {other:?}"),
    }
}

#[test]
fn test_encoding_is_deterministic() {
    // Same value must produce identical bytes on every call.
    let heartbeat = sample_heartbeat();
    let a = encode_heartbeat(&heartbeat).unwrap();
    let b = encode_heartbeat(&heartbeat).unwrap();
    assert_eq!(a, b);

    let control = sample_control();
    assert_eq!(
        encode_control(&control).unwrap(),
        encode_control(&control).unwrap()
    );
}

#[test]
fn test_header_layout() {
    let body = encode_control(&Control::default()).unwrap();
    assert_eq!(body[0], PROTOCOL_VERSION);
    assert_eq!(body[1], KIND_CONTROL);

    let body = encode_heartbeat(&sample_heartbeat()).unwrap();
    assert_eq!(body[0], PROTOCOL_VERSION);
    assert_eq!(body[1], KIND_HEARTBEAT);
    assert!(body.len() <= MAX_MESSAGE_LEN);
}

#[test]
fn test_partial_control_omits_fields() {
    // A default control carries no commands at all.
    let control = Control::default();
    assert!(control.master_enable.is_none());
    assert!(!control.has_actuation());

    let body = encode_control(&control).unwrap();
    match decode(&body).unwrap() {
        Message::Control(decoded) => {
            assert!(decoded.master_enable.is_none());
            assert!(decoded.thrusters.is_empty());
            assert!(decoded.controller_input.is_none());
        }
        other => panic!("expected control, got {other:?}"),
    }
}

#[test]
fn test_unsupported_version_rejected() {
    let mut body = encode_control(&Control::default()).unwrap();
    body[0] = 9;
    assert!(matches!(
        decode(&body),
        Err(DecodeError::UnsupportedVersion(9))
    ));
}

#[test]
fn test_unknown_kind_rejected() {
    let mut body = encode_control(&Control::default()).unwrap();
    body[1] = 0xEE;
    assert!(matches!(decode(&body), Err(DecodeError::UnknownKind(0xEE))));
}

#[test]
fn test_truncated_input_rejected() {
    // Empty and one-byte bodies cannot even carry the header.
    assert!(matches!(decode(&[]), Err(DecodeError::Truncated)));
    assert!(matches!(
        decode(&[PROTOCOL_VERSION]),
        Err(DecodeError::Truncated)
    ));

    // Cutting the payload short must fail, never panic.
    let body = encode_heartbeat(&sample_heartbeat()).unwrap();
    let result = decode(&body[..body.len() - 5]);
    assert!(matches!(result, Err(DecodeError::Truncated)));
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut body = encode_control(&sample_control()).unwrap();
    body.push(0x00);
    assert!(matches!(decode(&body), Err(DecodeError::Malformed)));
}

#[test]
fn test_garbage_payload_rejected() {
    let mut prefix = vec![PROTOCOL_VERSION, KIND_HEARTBEAT];
    prefix.extend_from_slice(&[0xFF; 64]);
    assert!(decode(&prefix).is_err());
}
