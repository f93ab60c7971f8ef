//! Wire codec for the vehicle <-> surface link.
//!
//! Two message kinds travel over the link: [`Heartbeat`] (vehicle ->
//! surface, one per tick) and [`Control`] (surface -> vehicle). Each
//! encoded message starts with a one-byte schema version and a one-byte
//! kind tag, followed by a bincode payload. Encoding is deterministic:
//! the same logical value always produces byte-identical output.
//!
//! Framing (length prefixes, reassembly) is the link session's job; this
//! module only sees complete message bodies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LIGHT_COUNT;
use crate::safety::SupervisorState;

/// Current wire schema version.
pub const PROTOCOL_VERSION: u8 = 1;

pub const KIND_HEARTBEAT: u8 = 1;
pub const KIND_CONTROL: u8 = 2;

/// Maximum encoded message body (version + kind + payload) in bytes.
/// Frames claiming more than this are a framing-contract violation.
pub const MAX_MESSAGE_LEN: usize = 4096;

fn wire_config() -> impl bincode::config::Config {
    bincode::config::standard()
}

/// Per-thruster state as reported in a heartbeat.
///
/// `measured_*` are `None` when the channel's last bus transaction
/// failed; `online` mirrors that distinction for quick display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrusterStatus {
    pub id: u8,
    pub enabled: bool,
    pub command_velocity: f32,
    pub measured_velocity: Option<f32>,
    pub measured_current: Option<f32>,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatus {
    pub id: u8,
    pub enabled: bool,
    pub measured_voltage: Option<f32>,
    pub measured_current: Option<f32>,
}

/// Power distribution board snapshot, refreshed each tick.
///
/// `is_connected` reflects the last bus transaction with the board, not
/// the state of the surface link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerBoardStatus {
    pub is_connected: bool,
    pub battery_voltage: f32,
    /// State of charge, 0-100.
    pub state_of_charge: u8,
    pub main_switch_enabled: bool,
    pub main_switch_current: f32,
    pub temperature: f32,
    pub switches: Vec<SwitchStatus>,
}

/// Environmental sensor readings. `None` means the sensor is absent or
/// its last read failed; a valid zero reading is `Some(0.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentalReading {
    pub depth_m: Option<f32>,
    pub pressure_kpa: Option<f32>,
    pub temperature_c: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerButtons {
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub start: bool,
    pub select: bool,
}

/// Last operator input snapshot, forwarded for telemetry and logging
/// only. Not a command: the core never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerInput {
    /// Stick axes in [-1, 1].
    pub left_stick: [f32; 2],
    pub right_stick: [f32; 2],
    /// Trigger axes in [0, 1].
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub buttons: ControllerButtons,
}

/// Full vehicle state snapshot, sent once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub sequence: u32,
    pub uptime_ms: u64,
    pub master_enable: bool,
    pub supervisor: SupervisorState,
    pub thrusters: Vec<ThrusterStatus>,
    pub power_board: PowerBoardStatus,
    pub environment: EnvironmentalReading,
    pub lights: [bool; LIGHT_COUNT],
    pub controller_input: Option<ControllerInput>,
    pub frames_rx: u32,
    pub frames_tx: u32,
    pub decode_errors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrusterCommand {
    pub id: u8,
    /// Normalized velocity in [-1, 1]; out-of-range values are clamped
    /// by the actuator bank, never rejected.
    pub velocity: f32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCommand {
    pub id: u8,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCommand {
    pub id: u8,
    pub on: bool,
}

/// Operator command set. Every field is optional: absent fields leave
/// the corresponding vehicle state unchanged (partial-update semantics,
/// distinguished on the wire from an explicit false/zero).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Control {
    pub master_enable: Option<bool>,
    pub thrusters: Vec<ThrusterCommand>,
    pub switches: Vec<SwitchCommand>,
    pub lights: Vec<LightCommand>,
    pub controller_input: Option<ControllerInput>,
}

impl Control {
    /// True if the message names any actuation target (as opposed to
    /// only a master-enable change or an informational snapshot).
    pub fn has_actuation(&self) -> bool {
        !self.thrusters.is_empty() || !self.switches.is_empty() || !self.lights.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Heartbeat(Heartbeat),
    Control(Control),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
    #[error("message truncated")]
    Truncated,
    #[error("malformed message payload")]
    Malformed,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("encoded message exceeds {MAX_MESSAGE_LEN} bytes")]
    TooLarge,
}

fn encode_message<T: Serialize>(kind: u8, value: &T) -> Result<Vec<u8>, EncodeError> {
    let payload = bincode::serde::encode_to_vec(value, wire_config())?;
    if payload.len() + 2 > MAX_MESSAGE_LEN {
        return Err(EncodeError::TooLarge);
    }
    let mut body = Vec::with_capacity(payload.len() + 2);
    body.push(PROTOCOL_VERSION);
    body.push(kind);
    body.extend_from_slice(&payload);
    Ok(body)
}

fn decode_payload<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<T, DecodeError> {
    let (value, consumed) =
        bincode::serde::decode_from_slice(payload, wire_config()).map_err(|e| match e {
            bincode::error::DecodeError::UnexpectedEnd { .. } => DecodeError::Truncated,
            _ => DecodeError::Malformed,
        })?;
    // Trailing bytes after the payload mean the frame lied about its
    // contents; treat it like any other corrupt frame.
    if consumed != payload.len() {
        return Err(DecodeError::Malformed);
    }
    Ok(value)
}

pub fn encode_heartbeat(heartbeat: &Heartbeat) -> Result<Vec<u8>, EncodeError> {
    encode_message(KIND_HEARTBEAT, heartbeat)
}

pub fn encode_control(control: &Control) -> Result<Vec<u8>, EncodeError> {
    encode_message(KIND_CONTROL, control)
}

/// Decode one complete message body (as produced by [`encode_heartbeat`]
/// or [`encode_control`]). Never panics on hostile input: every failure
/// is a [`DecodeError`] and the caller discards the frame.
pub fn decode(body: &[u8]) -> Result<Message, DecodeError> {
    if body.len() < 2 {
        return Err(DecodeError::Truncated);
    }
    let version = body[0];
    if version != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    match body[1] {
        KIND_HEARTBEAT => Ok(Message::Heartbeat(decode_payload(&body[2..])?)),
        KIND_CONTROL => Ok(Message::Control(decode_payload(&body[2..])?)),
        kind => Err(DecodeError::UnknownKind(kind)),
    }
}
