//! Integration test: fault entry and operator recovery.
//!
//! Covers the three recovery paths an operator meets: a recoverable
//! condition (interlock), a latched drive fault that needs a power cycle, and
//! a strut past its limit switch that needs the switch masked first.

use std::sync::Arc;

use hexgui_common::controller::{
    CommandKind, ControllerState, FaultCode, HexapodKind, LatchingFault, LimitDirection,
    MotionPattern, StateTrigger, SubstateTrigger,
};
use hexgui_control::{AlwaysConfirm, CommandError};
use hexgui_sim::Injection;

use super::{gui, start, wait_until};

const ENABLE: CommandKind = CommandKind::SetState(StateTrigger::Enable);
const CLEAR: CommandKind = CommandKind::SetState(StateTrigger::ClearError);
const MOVE: CommandKind = CommandKind::SetEnabledSubstate {
    trigger: SubstateTrigger::Move,
    pattern: MotionPattern::Sync,
};

#[tokio::test]
async fn interlock_fault_clears_once_closed() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 0.5).await;
    session.submit(gui(ENABLE)).await.unwrap();

    sim.inject(Injection::InterlockOpen(true));
    let view = wait_until(&session, "interlock fault", |v| {
        v.state() == Some(ControllerState::Fault)
    })
    .await;
    assert!(view.faults.contains(FaultCode::SafetyInterlock));
    assert!(!view.faults.requires_power_cycle());

    // Accepted, but the controller stays in Fault while the chain is open.
    let err = session.submit(gui(CLEAR)).await.unwrap_err();
    assert!(matches!(err, CommandError::Timeout(_)), "{err:?}");
    assert_eq!(session.view().state(), Some(ControllerState::Fault));

    // Enable and motion commands are refused in Fault without reaching the
    // controller.
    let received = sim.controller().lock().commands_received();
    let err = session.submit(gui(ENABLE)).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidCommand { .. }), "{err:?}");
    let err = session.submit(gui(MOVE)).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidCommand { .. }), "{err:?}");
    assert_eq!(sim.controller().lock().commands_received(), received);
    assert_eq!(session.view().state(), Some(ControllerState::Fault));

    sim.inject(Injection::InterlockOpen(false));
    let outcome = session.submit(gui(CLEAR)).await.unwrap();
    assert!(outcome.observed);
    let view = session.view();
    assert_eq!(view.state(), Some(ControllerState::Standby));
    assert!(!view.faults.contains(FaultCode::SafetyInterlock));
}

#[tokio::test]
async fn latched_fault_needs_power_cycle() {
    let (session, sim) = start(HexapodKind::M2, Arc::new(AlwaysConfirm), 0.5).await;
    session.submit(gui(ENABLE)).await.unwrap();

    sim.inject(Injection::LatchedFault {
        strut: 3,
        bits: LatchingFault::SHORT_CIRCUIT,
    });
    let view = wait_until(&session, "latched fault", |v| {
        v.state() == Some(ControllerState::Fault)
    })
    .await;
    let entry = view.faults.get(FaultCode::ShortCircuit).copied().unwrap();
    assert_eq!(entry.struts, 1 << 3);
    assert!(view.faults.requires_power_cycle());

    let err = session.submit(gui(CLEAR)).await.unwrap_err();
    assert!(matches!(err, CommandError::Timeout(_)), "{err:?}");
    assert_eq!(session.view().state(), Some(ControllerState::Fault));

    sim.inject(Injection::PowerCycle);
    let view = wait_until(&session, "standby after power cycle", |v| {
        v.state() == Some(ControllerState::Standby)
    })
    .await;
    assert!(!view.faults.requires_power_cycle());
}

#[tokio::test]
async fn masked_limit_switch_allows_moving_back() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;
    session.submit(gui(ENABLE)).await.unwrap();

    sim.inject(Injection::StrutOvertravel {
        strut: 0,
        direction: LimitDirection::Extend,
    });
    let view = wait_until(&session, "limit switch fault", |v| {
        v.state() == Some(ControllerState::Fault)
    })
    .await;
    assert!(view.faults.contains(FaultCode::LimitSwitchPositive));

    // The controller keeps the fault until the switch is masked.
    session
        .submit(gui(CommandKind::MaskLimitSwitch(LimitDirection::Extend)))
        .await
        .unwrap();
    let view = wait_until(&session, "limit switch masked", |v| {
        !v.faults.contains(FaultCode::LimitSwitchPositive)
    })
    .await;
    assert_eq!(view.masked, Some(LimitDirection::Extend));

    session.submit(gui(CLEAR)).await.unwrap();
    session.submit(gui(ENABLE)).await.unwrap();

    // Drive the strut back inside its travel.
    let back = CommandKind::SetRawPosition {
        struts: [14000.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    };
    session.submit(gui(back)).await.unwrap();
    session.submit(gui(MOVE)).await.unwrap();

    let view = wait_until(&session, "mask lifted", |v| {
        v.masked.is_none() && v.state().is_some_and(|s| s.is_stationary())
    })
    .await;
    assert_eq!(view.strut_positions().unwrap()[0], 14000.0);
    assert!(view.faults.is_empty());
    assert_eq!(sim.controller().lock().masked(), None);
}
