//! Actuator bank: owns commanded state for thrusters, switched-power
//! channels, lights and the main switch, and is the only place physical
//! outputs are written.
//!
//! `tick()` computes each channel's effective output under the
//! master-enable gate, pushes it through the [`DeviceDriver`], and reads
//! measured values back. A bus fault on one channel is isolated to that
//! channel: its measured values go absent for the tick and every other
//! channel still transacts.

use thiserror::Error;
use tracing::warn;

use crate::config::{LIGHT_COUNT, SWITCH_CHANNEL_COUNT, THRUSTER_COUNT};
use crate::driver::{DeviceDriver, DriverError, SwitchTelemetry, ThrusterTelemetry};
use crate::protocol::{EnvironmentalReading, PowerBoardStatus, SwitchStatus, ThrusterStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("{kind} channel {id} out of range")]
    OutOfRange { kind: &'static str, id: usize },
}

#[derive(Debug, Clone, Copy, Default)]
struct ThrusterChannel {
    enabled: bool,
    command_velocity: f32,
    measured: Option<ThrusterTelemetry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct SwitchChannel {
    enabled: bool,
    measured: Option<SwitchTelemetry>,
}

/// Result of one actuation tick. The power-board fault, if any, is
/// reported here so the safety supervisor can react to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    pub power_board_fault: Option<DriverError>,
    pub thruster_faults: u8,
    pub switch_faults: u8,
}

#[derive(Debug)]
pub struct ActuatorBank<D> {
    driver: D,
    thrusters: [ThrusterChannel; THRUSTER_COUNT],
    switches: [SwitchChannel; SWITCH_CHANNEL_COUNT],
    lights: [bool; LIGHT_COUNT],
    main_switch_enabled: bool,
    power_board: PowerBoardStatus,
    environment: EnvironmentalReading,
}

impl<D: DeviceDriver> ActuatorBank<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            thrusters: [ThrusterChannel::default(); THRUSTER_COUNT],
            switches: [SwitchChannel::default(); SWITCH_CHANNEL_COUNT],
            lights: [false; LIGHT_COUNT],
            main_switch_enabled: false,
            power_board: PowerBoardStatus {
                is_connected: false,
                battery_voltage: 0.0,
                state_of_charge: 0,
                main_switch_enabled: false,
                main_switch_current: 0.0,
                temperature: 0.0,
                switches: Vec::new(),
            },
            environment: EnvironmentalReading::default(),
        }
    }

    /// Stage a thruster command. Velocity is clamped to [-1, 1] before
    /// storage, never rejected for being out of range; only an unknown
    /// channel id is an error.
    pub fn set_thruster_command(
        &mut self,
        id: usize,
        velocity: f32,
        enabled: bool,
    ) -> Result<(), BankError> {
        let channel = self
            .thrusters
            .get_mut(id)
            .ok_or(BankError::OutOfRange { kind: "thruster", id })?;
        channel.command_velocity = velocity.clamp(-1.0, 1.0);
        channel.enabled = enabled;
        Ok(())
    }

    pub fn set_switch_channel(&mut self, id: usize, enabled: bool) -> Result<(), BankError> {
        let channel = self
            .switches
            .get_mut(id)
            .ok_or(BankError::OutOfRange { kind: "switch", id })?;
        channel.enabled = enabled;
        Ok(())
    }

    pub fn set_light(&mut self, id: usize, on: bool) -> Result<(), BankError> {
        let light = self
            .lights
            .get_mut(id)
            .ok_or(BankError::OutOfRange { kind: "light", id })?;
        *light = on;
        Ok(())
    }

    pub fn set_main_switch(&mut self, enabled: bool) {
        self.main_switch_enabled = enabled;
    }

    /// Run one actuation cycle: write every channel's effective output,
    /// read measured values back, and refresh the power-board snapshot.
    ///
    /// `allow_output` is the supervisor gate, sampled once by the caller
    /// for the whole tick. When false every thruster is driven to zero
    /// and every switch is driven open, regardless of per-channel
    /// enables.
    pub fn tick(&mut self, allow_output: bool) -> TickReport {
        let mut report = TickReport::default();

        for (id, channel) in self.thrusters.iter_mut().enumerate() {
            let effective = if channel.enabled && allow_output {
                channel.command_velocity
            } else {
                0.0
            };
            let result = self
                .driver
                .write_thruster(id, effective)
                .and_then(|()| self.driver.read_thruster(id));
            match result {
                Ok(telemetry) => channel.measured = Some(telemetry),
                Err(error) => {
                    warn!(thruster = id, %error, "thruster bus transaction failed");
                    channel.measured = None;
                    report.thruster_faults += 1;
                }
            }
        }

        for (id, channel) in self.switches.iter_mut().enumerate() {
            let effective = channel.enabled && allow_output;
            let result = self
                .driver
                .write_switch(id, effective)
                .and_then(|()| self.driver.read_switch(id));
            match result {
                Ok(telemetry) => channel.measured = Some(telemetry),
                Err(error) => {
                    warn!(switch = id, %error, "switch bus transaction failed");
                    channel.measured = None;
                    report.switch_faults += 1;
                }
            }
        }

        let main_effective = self.main_switch_enabled && allow_output;
        let pdb = self
            .driver
            .write_main_switch(main_effective)
            .and_then(|()| self.driver.read_power_board());
        match pdb {
            Ok(reading) => {
                self.power_board.is_connected = true;
                self.power_board.battery_voltage = reading.battery_voltage;
                self.power_board.state_of_charge = reading.state_of_charge;
                self.power_board.main_switch_enabled = main_effective;
                self.power_board.main_switch_current = reading.main_switch_current;
                self.power_board.temperature = reading.temperature;
            }
            Err(error) => {
                warn!(%error, "power board transaction failed");
                self.power_board.is_connected = false;
                report.power_board_fault = Some(error);
            }
        }
        self.power_board.switches = self.switch_statuses();

        self.environment = self.driver.read_environment();

        report
    }

    pub fn thruster_statuses(&self) -> Vec<ThrusterStatus> {
        self.thrusters
            .iter()
            .enumerate()
            .map(|(id, channel)| ThrusterStatus {
                id: id as u8,
                enabled: channel.enabled,
                command_velocity: channel.command_velocity,
                measured_velocity: channel.measured.map(|m| m.velocity),
                measured_current: channel.measured.map(|m| m.current),
                online: channel.measured.is_some(),
            })
            .collect()
    }

    fn switch_statuses(&self) -> Vec<SwitchStatus> {
        self.switches
            .iter()
            .enumerate()
            .map(|(id, channel)| SwitchStatus {
                id: id as u8,
                enabled: channel.enabled,
                measured_voltage: channel.measured.map(|m| m.voltage),
                measured_current: channel.measured.map(|m| m.current),
            })
            .collect()
    }

    pub fn power_board(&self) -> &PowerBoardStatus {
        &self.power_board
    }

    pub fn environment(&self) -> EnvironmentalReading {
        self.environment
    }

    pub fn lights(&self) -> [bool; LIGHT_COUNT] {
        self.lights
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
