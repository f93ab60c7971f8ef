//! Vehicle engine: the top-level orchestrator.
//!
//! Each control tick runs a fixed sequence: drain and dispatch inbound
//! traffic, evaluate safety, drive the actuator bank with the gate
//! sampled once, then emit telemetry. Nothing in a tick blocks and no
//! error escapes it; faults are folded into state and reported through
//! the next heartbeat.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bank::ActuatorBank;
use crate::config::EngineConfig;
use crate::dispatch::ControlDispatcher;
use crate::driver::DeviceDriver;
use crate::link::{LinkError, LinkSession, LinkState};
use crate::protocol::{self, Control, Heartbeat, Message};
use crate::safety::{SafetySupervisor, SupervisorState};
use crate::scheduler::HeartbeatScheduler;

pub struct RovEngine<D: DeviceDriver> {
    config: EngineConfig,
    link: LinkSession,
    bank: ActuatorBank<D>,
    supervisor: SafetySupervisor,
    dispatcher: ControlDispatcher,
    scheduler: HeartbeatScheduler,
    started: Instant,
    sequence: u32,
}

impl<D: DeviceDriver> RovEngine<D> {
    /// Bind the link and assemble the engine. Failing to bind the
    /// listening socket is the only fatal error the engine has.
    pub fn new(config: EngineConfig, driver: D) -> Result<Self, LinkError> {
        let link = LinkSession::bind(config.listen_port)?;
        let scheduler =
            HeartbeatScheduler::new(config.tick_period_ms, config.watchdog_deadline_ms());
        info!(
            port = link.local_port(),
            tick_ms = config.tick_period_ms,
            watchdog_ms = config.watchdog_deadline_ms(),
            "vehicle engine listening"
        );
        Ok(Self {
            config,
            link,
            bank: ActuatorBank::new(driver),
            supervisor: SafetySupervisor::new(),
            dispatcher: ControlDispatcher::new(),
            scheduler,
            started: Instant::now(),
            sequence: 0,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn local_port(&self) -> u16 {
        self.link.local_port()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &SafetySupervisor {
        &self.supervisor
    }

    pub fn driver(&self) -> &D {
        self.bank.driver()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        self.bank.driver_mut()
    }

    /// Drive the engine from an outer loop running at a finer cadence
    /// than the tick period: inbound traffic is serviced on every call,
    /// the full control tick only when one is due.
    pub fn poll(&mut self) {
        let now = self.now_ms();
        self.service_link(now);
        if self.scheduler.tick_due(now) {
            self.run_tick(now);
        }
    }

    /// Run one full control tick immediately, regardless of schedule.
    pub fn tick(&mut self) {
        let now = self.now_ms();
        self.service_link(now);
        self.run_tick(now);
    }

    /// Apply a control message from a local source, bypassing the link.
    pub fn submit_control(&mut self, control: &Control) {
        let now = self.now_ms();
        let link_state = self.link.state();
        self.dispatcher
            .apply(control, &mut self.supervisor, &mut self.bank, link_state, now);
    }

    fn service_link(&mut self, now_ms: u64) {
        match self.link.poll_accept() {
            Ok(true) => {
                // Fresh window: the watchdog must not fire before the
                // new peer has had a chance to send anything.
                self.scheduler.reset_watchdog(now_ms);
                if self.supervisor.state() == SupervisorState::Failsafe {
                    self.supervisor.on_link_connected(now_ms);
                }
            }
            Ok(false) => {}
            // Already logged by the link; the bound peer is unaffected.
            Err(_) => {}
        }

        loop {
            match self.link.try_receive() {
                Ok(Some(body)) => self.handle_frame(&body, now_ms),
                Ok(None) => break,
                Err(_) => break,
            }
        }
    }

    fn handle_frame(&mut self, body: &[u8], now_ms: u64) {
        match protocol::decode(body) {
            Ok(Message::Control(control)) => {
                self.scheduler.note_inbound(now_ms);
                if self.link.mark_fresh() {
                    self.supervisor.on_link_connected(now_ms);
                }
                let link_state = self.link.state();
                let outcome = self.dispatcher.apply(
                    &control,
                    &mut self.supervisor,
                    &mut self.bank,
                    link_state,
                    now_ms,
                );
                if !outcome.warnings.is_empty() {
                    debug!(warnings = ?outcome.warnings, "control applied with warnings");
                }
            }
            Ok(Message::Heartbeat(_)) => {
                // Well-formed traffic still proves the peer is alive.
                self.scheduler.note_inbound(now_ms);
                if self.link.mark_fresh() {
                    self.supervisor.on_link_connected(now_ms);
                }
                warn!("ignoring heartbeat sent by surface station");
            }
            Err(e) => {
                self.link.note_decode_error();
                warn!(error = %e, len = body.len(), "dropping undecodable message");
            }
        }
    }

    fn run_tick(&mut self, now_ms: u64) {
        self.evaluate_safety(now_ms);

        // The gate is sampled exactly once; a mid-tick transition takes
        // effect on the next tick.
        let gate = self.supervisor.master_enable();
        let report = self.bank.tick(gate);
        if let Some(err) = report.power_board_fault {
            self.supervisor.on_power_board_fault(&err, now_ms);
        }

        self.emit_heartbeat(now_ms);
    }

    // Failsafe resets only on a link-restore edge: a new peer binding
    // (service_link) or inbound traffic reviving a stale link
    // (handle_frame). A link that simply stayed Connected must not
    // clear a latch entered for some other fault.
    fn evaluate_safety(&mut self, now_ms: u64) {
        match self.link.state() {
            LinkState::Connected => {
                if self.scheduler.watchdog_expired(now_ms) {
                    self.link.mark_stale();
                    self.supervisor.on_link_stale(now_ms);
                }
            }
            LinkState::Stale => {
                self.supervisor.on_link_stale(now_ms);
            }
            LinkState::Disconnected => {
                self.supervisor.on_link_disconnected(now_ms);
            }
        }
    }

    fn emit_heartbeat(&mut self, now_ms: u64) {
        let heartbeat = self.build_heartbeat(now_ms);
        let body = match protocol::encode_heartbeat(&heartbeat) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to encode heartbeat");
                return;
            }
        };
        // Sequence counts delivered heartbeats: a tick with no peer (or
        // a failed send) re-emits the same number, so the surface never
        // sees gaps within one session.
        match self.link.send(&body) {
            Ok(()) => self.sequence = self.sequence.wrapping_add(1),
            Err(LinkError::NotConnected) => {}
            Err(e) => warn!(error = %e, "failed to send heartbeat"),
        }
    }

    fn build_heartbeat(&self, now_ms: u64) -> Heartbeat {
        let stats = self.link.stats();
        Heartbeat {
            sequence: self.sequence,
            uptime_ms: now_ms,
            master_enable: self.supervisor.master_enable(),
            supervisor: self.supervisor.state(),
            thrusters: self.bank.thruster_statuses(),
            power_board: self.bank.power_board().clone(),
            environment: self.bank.environment(),
            lights: self.bank.lights(),
            controller_input: self.dispatcher.last_controller_input(),
            frames_rx: stats.frames_rx,
            frames_tx: stats.frames_tx,
            decode_errors: stats.decode_errors,
        }
    }

    /// Current vehicle state as a heartbeat, without emitting it.
    pub fn snapshot(&self) -> Heartbeat {
        self.build_heartbeat(self.now_ms())
    }
}
