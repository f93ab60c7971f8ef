use serde::{Deserialize, Serialize};

/// Number of thruster channels on the vehicle. Six motor controllers,
/// one per thruster, addressed 0..5.
pub const THRUSTER_COUNT: usize = 6;

/// Number of switched-power channels on the power distribution board.
pub const SWITCH_CHANNEL_COUNT: usize = 9;

/// Number of independently switchable light channels.
pub const LIGHT_COUNT: usize = 2;

/// Engine tuning parameters.
///
/// The tick period and watchdog multiplier are operational tuning knobs
/// rather than protocol constants: the watchdog deadline is
/// `tick_period_ms * watchdog_multiplier`, and contact is declared lost
/// once no valid inbound frame has arrived within that window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TCP port the vehicle listens on for the surface station.
    pub listen_port: u16,
    /// Control loop period in milliseconds.
    pub tick_period_ms: u64,
    /// Watchdog deadline as a multiple of the tick period.
    pub watchdog_multiplier: u64,
}

impl EngineConfig {
    pub fn watchdog_deadline_ms(&self) -> u64 {
        self.tick_period_ms * self.watchdog_multiplier
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_port: 65432,
            tick_period_ms: 200,
            watchdog_multiplier: 3,
        }
    }
}
