//! Safety supervisor.
//!
//! Owns the master enable gate. Actuator output is only permitted while
//! the supervisor is `Armed`; every transition is driven by an explicit
//! operator command or by a detected fault, and is recorded in a bounded
//! history ring for post-incident review.
//!
//! State machine:
//!
//! ```text
//!   Disabled --arm (link connected)--> Armed
//!   Armed    --disarm--------------- > Disabled
//!   Armed    --link stale/lost------ > Failsafe
//!   Armed    --power bus fault------ > Failsafe
//!   Failsafe --link reconnected----- > Disabled   (re-arm is manual)
//! ```

use heapless::Vec as HeaplessVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::driver::DriverError;
use crate::link::LinkState;

const EVENT_HISTORY_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorState {
    /// Power-on state. Thrusters and switched buses are forced off.
    Disabled,
    /// Operator has armed the vehicle; actuation commands take effect.
    Armed,
    /// A fault latched while armed. Output is forced off until the
    /// operator reconnects and re-arms.
    Failsafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitionReason {
    OperatorArm,
    OperatorDisarm,
    LinkStale,
    LinkLost,
    PowerBusFault,
    LinkRestored,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetyEvent {
    pub timestamp_ms: u64,
    pub from: SupervisorState,
    pub to: SupervisorState,
    pub reason: TransitionReason,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ArmError {
    #[error("cannot arm without a connected surface station")]
    LinkNotConnected,
    #[error("cannot arm from failsafe, reconnect and re-arm")]
    InFailsafe,
}

#[derive(Debug)]
pub struct SafetySupervisor {
    state: SupervisorState,
    history: HeaplessVec<SafetyEvent, EVENT_HISTORY_CAPACITY>,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Disabled,
            history: HeaplessVec::new(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// The actuation gate: true only while `Armed`.
    pub fn master_enable(&self) -> bool {
        self.state == SupervisorState::Armed
    }

    pub fn history(&self) -> &[SafetyEvent] {
        &self.history
    }

    /// Operator arm request. Requires a connected link and refuses to
    /// arm straight out of failsafe: the operator must observe the
    /// reset to `Disabled` first.
    pub fn request_arm(&mut self, link: LinkState, now_ms: u64) -> Result<(), ArmError> {
        match self.state {
            SupervisorState::Armed => Ok(()),
            SupervisorState::Failsafe => {
                warn!("arm rejected while in failsafe");
                Err(ArmError::InFailsafe)
            }
            SupervisorState::Disabled => {
                if link != LinkState::Connected {
                    warn!("arm rejected, no connected surface station");
                    return Err(ArmError::LinkNotConnected);
                }
                self.transition(SupervisorState::Armed, TransitionReason::OperatorArm, now_ms);
                Ok(())
            }
        }
    }

    /// Operator disarm. Always honored; from `Failsafe` it clears the
    /// latch the same way a reconnect does.
    pub fn disarm(&mut self, now_ms: u64) {
        if self.state != SupervisorState::Disabled {
            self.transition(
                SupervisorState::Disabled,
                TransitionReason::OperatorDisarm,
                now_ms,
            );
        }
    }

    /// Watchdog expiry while the transport is still open.
    pub fn on_link_stale(&mut self, now_ms: u64) {
        if self.state == SupervisorState::Armed {
            self.transition(SupervisorState::Failsafe, TransitionReason::LinkStale, now_ms);
        }
    }

    /// Transport dropped entirely.
    pub fn on_link_disconnected(&mut self, now_ms: u64) {
        if self.state == SupervisorState::Armed {
            self.transition(SupervisorState::Failsafe, TransitionReason::LinkLost, now_ms);
        }
    }

    /// Power distribution board reported a bus fault.
    pub fn on_power_board_fault(&mut self, err: &DriverError, now_ms: u64) {
        if self.state == SupervisorState::Armed && matches!(err, DriverError::BusFault) {
            self.transition(
                SupervisorState::Failsafe,
                TransitionReason::PowerBusFault,
                now_ms,
            );
        }
    }

    /// A surface station (re)connected. A latched failsafe resets to
    /// `Disabled`; arming back up remains an explicit operator step.
    pub fn on_link_connected(&mut self, now_ms: u64) {
        if self.state == SupervisorState::Failsafe {
            self.transition(
                SupervisorState::Disabled,
                TransitionReason::LinkRestored,
                now_ms,
            );
        }
    }

    fn transition(&mut self, to: SupervisorState, reason: TransitionReason, now_ms: u64) {
        let event = SafetyEvent {
            timestamp_ms: now_ms,
            from: self.state,
            to,
            reason,
        };
        match to {
            SupervisorState::Failsafe => {
                warn!(from = ?event.from, ?reason, "entering failsafe, actuation forced off");
            }
            _ => info!(from = ?event.from, ?to, ?reason, "supervisor transition"),
        }
        self.state = to;
        if self.history.is_full() {
            self.history.remove(0);
        }
        // Capacity was just ensured.
        let _ = self.history.push(event);
    }
}

impl Default for SafetySupervisor {
    fn default() -> Self {
        Self::new()
    }
}
