//! # ROV Link Engine
//!
//! Vehicle-side control and communication engine for a tethered
//! remotely operated underwater vehicle. The engine owns the link to
//! the surface station, the actuator bank, and the safety supervisor,
//! and drives everything from a fixed-rate control tick.
//!
//! ## Features
//!
//! - **Binary message codec**: versioned, length-delimited heartbeat
//!   and control frames with deterministic encoding
//! - **Actuator bank**: six thrusters, nine switched power buses, and
//!   lights behind a single gated output stage
//! - **Device driver seam**: hardware access behind a trait, with a
//!   fault-injectable simulated driver for development and test
//! - **Safety supervisor**: disarm-by-default state machine with a
//!   latched failsafe on link loss or power bus faults
//! - **Link watchdog**: a silent surface station forces actuation off
//!   within a bounded number of ticks
//!
//! ## Quick Start
//!
//! ```no_run
//! use rovlink::{EngineConfig, RovEngine, SimDriver};
//!
//! let mut engine = RovEngine::new(EngineConfig::default(), SimDriver::new())
//!     .expect("bind listen socket");
//!
//! loop {
//!     engine.poll();
//!     std::thread::sleep(std::time::Duration::from_millis(20));
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`engine`] - Main orchestrator and public API
//! - [`protocol`] - Wire message types and binary codec
//! - [`bank`] - Actuator bank over the device driver
//! - [`driver`] - Device driver trait and simulated driver
//! - [`link`] - TCP session, framing, and link state
//! - [`safety`] - Safety supervisor state machine
//! - [`dispatch`] - Control message dispatch
//! - [`scheduler`] - Tick cadence and link watchdog

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod bank;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod link;
pub mod protocol;
pub mod safety;
pub mod scheduler;

// Re-export main public types for convenience
pub use bank::ActuatorBank;
pub use config::EngineConfig;
pub use driver::{DeviceDriver, DriverError, SimDriver, SimTarget};
pub use engine::RovEngine;
pub use link::{LinkError, LinkState};
pub use protocol::{Control, Heartbeat, Message};
pub use safety::{SafetySupervisor, SupervisorState};
