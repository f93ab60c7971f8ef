use rovlink::driver::DriverError;
use rovlink::link::LinkState;
use rovlink::safety::{ArmError, SafetySupervisor, SupervisorState, TransitionReason};

#[test]
fn test_supervisor_starts_disabled() {
    let supervisor = SafetySupervisor::new();
    assert_eq!(supervisor.state(), SupervisorState::Disabled);
    assert!(!supervisor.master_enable());
    assert!(supervisor.history().is_empty());
}

#[test]
fn test_arm_requires_connected_link() {
    let mut supervisor = SafetySupervisor::new();

    assert_eq!(
        supervisor.request_arm(LinkState::Disconnected, 100),
        Err(ArmError::LinkNotConnected)
    );
    assert_eq!(
        supervisor.request_arm(LinkState::Stale, 100),
        Err(ArmError::LinkNotConnected)
    );
    assert_eq!(supervisor.state(), SupervisorState::Disabled);

    supervisor.request_arm(LinkState::Connected, 200).unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Armed);
    assert!(supervisor.master_enable());
}

#[test]
fn test_arm_is_idempotent() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();
    supervisor.request_arm(LinkState::Connected, 200).unwrap();

    assert_eq!(supervisor.state(), SupervisorState::Armed);
    // Only the first request transitioned.
    assert_eq!(supervisor.history().len(), 1);
}

#[test]
fn test_disarm_from_armed() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();
    supervisor.disarm(200);

    assert_eq!(supervisor.state(), SupervisorState::Disabled);
    assert!(!supervisor.master_enable());
}

#[test]
fn test_stale_link_latches_failsafe() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();

    supervisor.on_link_stale(700);
    assert_eq!(supervisor.state(), SupervisorState::Failsafe);
    assert!(!supervisor.master_enable());

    let event = supervisor.history().last().unwrap();
    assert_eq!(event.reason, TransitionReason::LinkStale);
    assert_eq!(event.timestamp_ms, 700);
}

#[test]
fn test_link_loss_latches_failsafe() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();

    supervisor.on_link_disconnected(500);
    assert_eq!(supervisor.state(), SupervisorState::Failsafe);
    assert_eq!(
        supervisor.history().last().unwrap().reason,
        TransitionReason::LinkLost
    );
}

#[test]
fn test_link_events_ignored_while_disabled() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.on_link_stale(100);
    supervisor.on_link_disconnected(200);

    // Not armed, so no fault to latch.
    assert_eq!(supervisor.state(), SupervisorState::Disabled);
    assert!(supervisor.history().is_empty());
}

#[test]
fn test_bus_fault_latches_failsafe_only_when_armed() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.on_power_board_fault(&DriverError::BusFault, 100);
    assert_eq!(supervisor.state(), SupervisorState::Disabled);

    supervisor.request_arm(LinkState::Connected, 200).unwrap();
    supervisor.on_power_board_fault(&DriverError::BusFault, 300);
    assert_eq!(supervisor.state(), SupervisorState::Failsafe);
    assert_eq!(
        supervisor.history().last().unwrap().reason,
        TransitionReason::PowerBusFault
    );
}

#[test]
fn test_transient_driver_errors_do_not_latch() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();

    supervisor.on_power_board_fault(&DriverError::Timeout, 200);
    supervisor.on_power_board_fault(&DriverError::NotAcknowledged, 300);
    assert_eq!(supervisor.state(), SupervisorState::Armed);
}

#[test]
fn test_arm_rejected_while_in_failsafe() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();
    supervisor.on_link_stale(700);

    assert_eq!(
        supervisor.request_arm(LinkState::Connected, 800),
        Err(ArmError::InFailsafe)
    );
    assert_eq!(supervisor.state(), SupervisorState::Failsafe);
}

#[test]
fn test_reconnect_resets_failsafe_to_disabled() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();
    supervisor.on_link_disconnected(500);
    assert_eq!(supervisor.state(), SupervisorState::Failsafe);

    supervisor.on_link_connected(900);
    assert_eq!(supervisor.state(), SupervisorState::Disabled);
    assert_eq!(
        supervisor.history().last().unwrap().reason,
        TransitionReason::LinkRestored
    );

    // Re-arming after the reset is a fresh operator decision.
    supervisor.request_arm(LinkState::Connected, 1000).unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Armed);
}

#[test]
fn test_disarm_clears_failsafe_latch() {
    let mut supervisor = SafetySupervisor::new();
    supervisor.request_arm(LinkState::Connected, 100).unwrap();
    supervisor.on_link_stale(700);

    supervisor.disarm(800);
    assert_eq!(supervisor.state(), SupervisorState::Disabled);
    supervisor.request_arm(LinkState::Connected, 900).unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Armed);
}

#[test]
fn test_history_is_bounded() {
    let mut supervisor = SafetySupervisor::new();
    // Far more transitions than the ring holds.
    for i in 0..50u64 {
        supervisor
            .request_arm(LinkState::Connected, i * 10)
            .unwrap();
        supervisor.disarm(i * 10 + 5);
    }
    assert_eq!(supervisor.history().len(), 32);
    // Oldest events were evicted: the ring ends with the latest disarm.
    let last = supervisor.history().last().unwrap();
    assert_eq!(last.reason, TransitionReason::OperatorDisarm);
    assert_eq!(last.timestamp_ms, 495);
}
