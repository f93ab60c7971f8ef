use rovlink::bank::ActuatorBank;
use rovlink::dispatch::{ControlDispatcher, DispatchWarning};
use rovlink::driver::SimDriver;
use rovlink::link::LinkState;
use rovlink::protocol::{
    Control, ControllerButtons, ControllerInput, LightCommand, SwitchCommand, ThrusterCommand,
};
use rovlink::safety::{ArmError, SafetySupervisor, SupervisorState};

struct Fixture {
    dispatcher: ControlDispatcher,
    supervisor: SafetySupervisor,
    bank: ActuatorBank<SimDriver>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dispatcher: ControlDispatcher::new(),
            supervisor: SafetySupervisor::new(),
            bank: ActuatorBank::new(SimDriver::new()),
        }
    }

    fn armed() -> Self {
        let mut f = Self::new();
        f.supervisor.request_arm(LinkState::Connected, 0).unwrap();
        f
    }

    fn apply(&mut self, control: &Control) -> Vec<DispatchWarning> {
        self.dispatcher
            .apply(
                control,
                &mut self.supervisor,
                &mut self.bank,
                LinkState::Connected,
                1000,
            )
            .warnings
            .to_vec()
    }
}

#[test]
fn test_empty_control_changes_nothing() {
    let mut f = Fixture::armed();
    f.bank.set_thruster_command(0, 0.5, true).unwrap();

    let warnings = f.apply(&Control::default());

    assert!(warnings.is_empty());
    assert_eq!(f.supervisor.state(), SupervisorState::Armed);
    // Previously staged state is untouched by a partial update.
    assert_eq!(f.bank.thruster_statuses()[0].command_velocity, 0.5);
}

#[test]
fn test_arm_and_disarm_via_master_enable() {
    let mut f = Fixture::new();
    let arm = Control {
        master_enable: Some(true),
        ..Control::default()
    };
    assert!(f.apply(&arm).is_empty());
    assert_eq!(f.supervisor.state(), SupervisorState::Armed);

    let disarm = Control {
        master_enable: Some(false),
        ..Control::default()
    };
    assert!(f.apply(&disarm).is_empty());
    assert_eq!(f.supervisor.state(), SupervisorState::Disabled);
}

#[test]
fn test_arm_and_actuate_in_one_message() {
    // Master enable applies before actuation, so a single message can
    // arm and command a thruster.
    let mut f = Fixture::new();
    let control = Control {
        master_enable: Some(true),
        thrusters: vec![ThrusterCommand {
            id: 0,
            velocity: 0.4,
            enabled: true,
        }],
        ..Control::default()
    };

    assert!(f.apply(&control).is_empty());
    assert_eq!(f.supervisor.state(), SupervisorState::Armed);
    assert_eq!(f.bank.thruster_statuses()[0].command_velocity, 0.4);
}

#[test]
fn test_actuation_blocked_while_disabled() {
    let mut f = Fixture::new();
    let control = Control {
        thrusters: vec![ThrusterCommand {
            id: 0,
            velocity: 0.9,
            enabled: true,
        }],
        ..Control::default()
    };

    let warnings = f.apply(&control);
    assert_eq!(warnings, vec![DispatchWarning::ActuationBlocked]);
    assert_eq!(f.bank.thruster_statuses()[0].command_velocity, 0.0);
    assert_eq!(f.dispatcher.controls_blocked(), 1);
}

#[test]
fn test_unknown_ids_warned_valid_ids_applied() {
    let mut f = Fixture::armed();
    let control = Control {
        thrusters: vec![
            ThrusterCommand {
                id: 99,
                velocity: 0.5,
                enabled: true,
            },
            ThrusterCommand {
                id: 0,
                velocity: 0.5,
                enabled: true,
            },
        ],
        switches: vec![SwitchCommand {
            id: 42,
            enabled: true,
        }],
        lights: vec![LightCommand { id: 9, on: true }],
        ..Control::default()
    };

    let warnings = f.apply(&control);
    assert_eq!(
        warnings,
        vec![
            DispatchWarning::UnknownThruster(99),
            DispatchWarning::UnknownSwitch(42),
            DispatchWarning::UnknownLight(9),
        ]
    );
    // The valid command in the same message still landed.
    assert_eq!(f.bank.thruster_statuses()[0].command_velocity, 0.5);
}

#[test]
fn test_dispatch_is_idempotent() {
    let mut f = Fixture::armed();
    let control = Control {
        thrusters: vec![ThrusterCommand {
            id: 1,
            velocity: -0.3,
            enabled: true,
        }],
        switches: vec![SwitchCommand {
            id: 2,
            enabled: true,
        }],
        ..Control::default()
    };

    f.apply(&control);
    let first = f.bank.thruster_statuses();
    f.apply(&control);
    let second = f.bank.thruster_statuses();

    assert_eq!(first, second);
    assert_eq!(f.dispatcher.controls_applied(), 2);
}

#[test]
fn test_arm_rejected_warning_surfaces_reason() {
    let mut f = Fixture::armed();
    f.supervisor.on_link_stale(500);
    assert_eq!(f.supervisor.state(), SupervisorState::Failsafe);

    let control = Control {
        master_enable: Some(true),
        ..Control::default()
    };
    let warnings = f.apply(&control);
    assert_eq!(
        warnings,
        vec![DispatchWarning::ArmRejected(ArmError::InFailsafe)]
    );
}

#[test]
fn test_controller_input_recorded_without_arming() {
    let mut f = Fixture::new();
    let control = Control {
        controller_input: Some(ControllerInput {
            left_stick: [0.7, 0.0],
            right_stick: [0.0, 0.0],
            left_trigger: 0.0,
            right_trigger: 1.0,
            buttons: ControllerButtons::default(),
        }),
        ..Control::default()
    };

    // Raw input is telemetry passthrough, never gated actuation.
    let warnings = f.apply(&control);
    assert!(warnings.is_empty());
    let stored = f.dispatcher.last_controller_input().unwrap();
    assert_eq!(stored.left_stick, [0.7, 0.0]);
}
