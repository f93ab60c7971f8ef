//! Hardware-facing capability boundary.
//!
//! The engine talks to motor controllers and the power distribution
//! board exclusively through [`DeviceDriver`]; the real bus protocol
//! lives in the hardware layer behind this trait. [`SimDriver`] is the
//! in-crate simulated implementation used by the vehicle binary when no
//! hardware layer is supplied, and by the test suite.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SWITCH_CHANNEL_COUNT, THRUSTER_COUNT};
use crate::protocol::EnvironmentalReading;

/// Failure of a single bus transaction. A failed transaction is never
/// retried within the same tick; the fault is surfaced and the next
/// scheduled tick tries again, keeping tick duration bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DriverError {
    #[error("bus transaction timed out")]
    Timeout,
    #[error("device did not acknowledge")]
    NotAcknowledged,
    #[error("bus fault")]
    BusFault,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrusterTelemetry {
    pub velocity: f32,
    pub current: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchTelemetry {
    pub voltage: f32,
    pub current: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerBoardReading {
    pub battery_voltage: f32,
    pub state_of_charge: u8,
    pub main_switch_current: f32,
    pub temperature: f32,
}

/// Capability set the hardware layer must provide. All operations are
/// bounded-time: an implementation that cannot complete a transaction
/// within its budget must return [`DriverError::Timeout`] rather than
/// block the control loop.
pub trait DeviceDriver {
    fn write_thruster(&mut self, id: usize, velocity: f32) -> Result<(), DriverError>;
    fn read_thruster(&mut self, id: usize) -> Result<ThrusterTelemetry, DriverError>;
    fn write_switch(&mut self, id: usize, enabled: bool) -> Result<(), DriverError>;
    fn read_switch(&mut self, id: usize) -> Result<SwitchTelemetry, DriverError>;
    fn write_main_switch(&mut self, enabled: bool) -> Result<(), DriverError>;
    fn read_power_board(&mut self) -> Result<PowerBoardReading, DriverError>;
    fn read_environment(&mut self) -> EnvironmentalReading;
}

/// Simulation target for fault injection on the [`SimDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimTarget {
    Thruster(usize),
    Switch(usize),
    PowerBoard,
}

const BATTERY_FULL_V: f32 = 16.8;
const BATTERY_EMPTY_V: f32 = 12.8;
const BUS_VOLTAGE_V: f32 = 12.0;
const THRUSTER_FULL_SCALE_A: f32 = 8.0;

/// Simulated hardware: six thrusters with first-order spin-up, a power
/// board with nine switched buses and a slowly discharging battery, and
/// a depth/pressure/temperature sensor set.
#[derive(Debug)]
pub struct SimDriver {
    thruster_command: [f32; THRUSTER_COUNT],
    thruster_velocity: [f32; THRUSTER_COUNT],
    switch_enabled: [bool; SWITCH_CHANNEL_COUNT],
    main_switch_enabled: bool,
    battery_voltage: f32,
    ticks: u64,

    thruster_faults: [Option<DriverError>; THRUSTER_COUNT],
    switch_faults: [Option<DriverError>; SWITCH_CHANNEL_COUNT],
    power_board_fault: Option<DriverError>,
}

impl SimDriver {
    pub fn new() -> Self {
        Self {
            thruster_command: [0.0; THRUSTER_COUNT],
            thruster_velocity: [0.0; THRUSTER_COUNT],
            switch_enabled: [false; SWITCH_CHANNEL_COUNT],
            main_switch_enabled: false,
            battery_voltage: BATTERY_FULL_V,
            ticks: 0,
            thruster_faults: [None; THRUSTER_COUNT],
            switch_faults: [None; SWITCH_CHANNEL_COUNT],
            power_board_fault: None,
        }
    }

    pub fn inject_fault(&mut self, target: SimTarget, error: DriverError) {
        match target {
            SimTarget::Thruster(id) => {
                if let Some(slot) = self.thruster_faults.get_mut(id) {
                    *slot = Some(error);
                }
            }
            SimTarget::Switch(id) => {
                if let Some(slot) = self.switch_faults.get_mut(id) {
                    *slot = Some(error);
                }
            }
            SimTarget::PowerBoard => self.power_board_fault = Some(error),
        }
    }

    pub fn clear_faults(&mut self) {
        self.thruster_faults = [None; THRUSTER_COUNT];
        self.switch_faults = [None; SWITCH_CHANNEL_COUNT];
        self.power_board_fault = None;
    }

    /// Velocity most recently written to a thruster channel.
    pub fn commanded_velocity(&self, id: usize) -> f32 {
        self.thruster_command[id]
    }

    /// Enable state most recently written to a switch channel.
    pub fn switch_state(&self, id: usize) -> bool {
        self.switch_enabled[id]
    }

    pub fn main_switch_state(&self) -> bool {
        self.main_switch_enabled
    }

    fn check_thruster(&self, id: usize) -> Result<(), DriverError> {
        match self.thruster_faults.get(id) {
            Some(None) => Ok(()),
            Some(Some(error)) => Err(*error),
            None => Err(DriverError::NotAcknowledged),
        }
    }

    fn check_switch(&self, id: usize) -> Result<(), DriverError> {
        match self.switch_faults.get(id) {
            Some(None) => Ok(()),
            Some(Some(error)) => Err(*error),
            None => Err(DriverError::NotAcknowledged),
        }
    }

    fn state_of_charge(&self) -> u8 {
        let span = BATTERY_FULL_V - BATTERY_EMPTY_V;
        let level = (self.battery_voltage - BATTERY_EMPTY_V) / span;
        (level.clamp(0.0, 1.0) * 100.0) as u8
    }

    fn total_thruster_current(&self) -> f32 {
        self.thruster_velocity
            .iter()
            .map(|v| v.abs() * THRUSTER_FULL_SCALE_A)
            .sum()
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDriver for SimDriver {
    fn write_thruster(&mut self, id: usize, velocity: f32) -> Result<(), DriverError> {
        self.check_thruster(id)?;
        self.thruster_command[id] = velocity;
        // First-order spin-up toward the commanded velocity.
        let delta = velocity - self.thruster_velocity[id];
        self.thruster_velocity[id] += delta * 0.5;
        Ok(())
    }

    fn read_thruster(&mut self, id: usize) -> Result<ThrusterTelemetry, DriverError> {
        self.check_thruster(id)?;
        Ok(ThrusterTelemetry {
            velocity: self.thruster_velocity[id],
            current: self.thruster_velocity[id].abs() * THRUSTER_FULL_SCALE_A,
        })
    }

    fn write_switch(&mut self, id: usize, enabled: bool) -> Result<(), DriverError> {
        self.check_switch(id)?;
        self.switch_enabled[id] = enabled;
        Ok(())
    }

    fn read_switch(&mut self, id: usize) -> Result<SwitchTelemetry, DriverError> {
        self.check_switch(id)?;
        let on = self.switch_enabled[id];
        Ok(SwitchTelemetry {
            voltage: if on { BUS_VOLTAGE_V } else { 0.0 },
            current: if on { 0.4 } else { 0.0 },
        })
    }

    fn write_main_switch(&mut self, enabled: bool) -> Result<(), DriverError> {
        if let Some(error) = self.power_board_fault {
            return Err(error);
        }
        self.main_switch_enabled = enabled;
        Ok(())
    }

    fn read_power_board(&mut self) -> Result<PowerBoardReading, DriverError> {
        if let Some(error) = self.power_board_fault {
            return Err(error);
        }
        self.ticks = self.ticks.wrapping_add(1);
        // Battery sags under thruster load and drifts down over time.
        let load = self.total_thruster_current();
        self.battery_voltage =
            (self.battery_voltage - load * 1.0e-4 - 2.0e-5).max(BATTERY_EMPTY_V);
        Ok(PowerBoardReading {
            battery_voltage: self.battery_voltage,
            state_of_charge: self.state_of_charge(),
            main_switch_current: if self.main_switch_enabled { load + 0.8 } else { 0.0 },
            temperature: 24.0 + load * 0.05,
        })
    }

    fn read_environment(&mut self) -> EnvironmentalReading {
        let t = self.ticks as f32 * 0.01;
        let depth = 5.0 + t.sin() * 0.5;
        EnvironmentalReading {
            depth_m: Some(depth),
            // Hydrostatic pressure plus one atmosphere, in kPa.
            pressure_kpa: Some(101.3 + depth * 9.8),
            temperature_c: Some(8.5),
        }
    }
}
