//! Control message dispatch.
//!
//! Translates one inbound [`Control`] into supervisor and actuator bank
//! calls. Dispatch is total: a bad field produces a warning and the
//! rest of the message still applies, so a typo in one thruster id
//! never costs the operator the whole frame.

use heapless::Vec as HeaplessVec;
use tracing::{debug, warn};

use crate::bank::{ActuatorBank, BankError};
use crate::driver::DeviceDriver;
use crate::link::LinkState;
use crate::protocol::{Control, ControllerInput};
use crate::safety::{ArmError, SafetySupervisor};

pub const MAX_DISPATCH_WARNINGS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchWarning {
    UnknownThruster(u8),
    UnknownSwitch(u8),
    UnknownLight(u8),
    ArmRejected(ArmError),
    /// Actuation fields were present but the vehicle is not armed.
    ActuationBlocked,
}

#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub warnings: HeaplessVec<DispatchWarning, MAX_DISPATCH_WARNINGS>,
}

impl DispatchOutcome {
    fn warn(&mut self, warning: DispatchWarning) {
        // Past the cap the count in the log stream still tells the story.
        let _ = self.warnings.push(warning);
    }
}

#[derive(Debug, Default)]
pub struct ControlDispatcher {
    controls_applied: u32,
    controls_blocked: u32,
    last_controller_input: Option<ControllerInput>,
}

impl ControlDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controls_applied(&self) -> u32 {
        self.controls_applied
    }

    pub fn controls_blocked(&self) -> u32 {
        self.controls_blocked
    }

    /// Raw operator input carried by the most recent control message,
    /// echoed back in telemetry for surface-side debugging.
    pub fn last_controller_input(&self) -> Option<ControllerInput> {
        self.last_controller_input
    }

    /// Apply one control message. Fields set to `None` (or left empty)
    /// are untouched: a message is a partial update, not a full state.
    pub fn apply<D: DeviceDriver>(
        &mut self,
        control: &Control,
        supervisor: &mut SafetySupervisor,
        bank: &mut ActuatorBank<D>,
        link: LinkState,
        now_ms: u64,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        // Master enable is handled before actuation so a single message
        // carrying both an arm request and thruster commands behaves as
        // the operator expects.
        match control.master_enable {
            Some(true) => {
                if let Err(e) = supervisor.request_arm(link, now_ms) {
                    outcome.warn(DispatchWarning::ArmRejected(e));
                }
            }
            Some(false) => supervisor.disarm(now_ms),
            None => {}
        }

        if let Some(input) = control.controller_input {
            self.last_controller_input = Some(input);
        }

        if control.has_actuation() && !supervisor.master_enable() {
            debug!("actuation fields ignored, vehicle not armed");
            outcome.warn(DispatchWarning::ActuationBlocked);
            self.controls_blocked = self.controls_blocked.saturating_add(1);
            return outcome;
        }

        for cmd in &control.thrusters {
            match bank.set_thruster_command(cmd.id as usize, cmd.velocity, cmd.enabled) {
                Ok(()) => {}
                Err(BankError::OutOfRange { .. }) => {
                    warn!(id = cmd.id, "control names unknown thruster");
                    outcome.warn(DispatchWarning::UnknownThruster(cmd.id));
                }
            }
        }
        for cmd in &control.switches {
            match bank.set_switch_channel(cmd.id as usize, cmd.enabled) {
                Ok(()) => {}
                Err(BankError::OutOfRange { .. }) => {
                    warn!(id = cmd.id, "control names unknown switch channel");
                    outcome.warn(DispatchWarning::UnknownSwitch(cmd.id));
                }
            }
        }
        for cmd in &control.lights {
            match bank.set_light(cmd.id as usize, cmd.on) {
                Ok(()) => {}
                Err(BankError::OutOfRange { .. }) => {
                    warn!(id = cmd.id, "control names unknown light");
                    outcome.warn(DispatchWarning::UnknownLight(cmd.id));
                }
            }
        }

        self.controls_applied = self.controls_applied.saturating_add(1);
        outcome
    }
}
