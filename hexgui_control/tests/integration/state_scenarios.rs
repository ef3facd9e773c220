//! Integration test: state tracking and command gating against the
//! simulated controller.

use std::sync::Arc;

use hexgui_common::controller::{
    CommandKind, CommandSource, ControllerState, EnabledSubstate, HexapodKind, MotionPattern, Pose,
    StateTrigger, SubstateTrigger,
};
use hexgui_control::{AlwaysConfirm, CommandError, NeverConfirm};
use hexgui_sim::Injection;

use super::{gui, start, wait_until};

const ENABLE: CommandKind = CommandKind::SetState(StateTrigger::Enable);

const fn move_sync() -> CommandKind {
    CommandKind::SetEnabledSubstate {
        trigger: SubstateTrigger::Move,
        pattern: MotionPattern::Sync,
    }
}

#[tokio::test]
async fn session_starts_in_reported_standby() {
    let (session, _sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;
    let view = session.view();
    assert_eq!(view.state(), Some(ControllerState::Standby));
    assert_eq!(view.commander, Some(CommandSource::Gui));
    assert!(view.faults.is_empty());
    assert!(view.config.is_some(), "controller config published on connect");
}

#[tokio::test]
async fn move_in_standby_is_refused_locally() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;

    let err = session.submit(gui(move_sync())).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidCommand { .. }), "{err:?}");

    // Nothing reached the controller.
    assert_eq!(sim.controller().lock().state(), ControllerState::Standby);
}

#[tokio::test]
async fn enable_move_and_settle() {
    let (session, sim) = start(HexapodKind::M2, Arc::new(AlwaysConfirm), 2.0).await;

    let outcome = session.submit(gui(ENABLE)).await.unwrap();
    assert!(outcome.observed);
    assert!(session.view().state().unwrap().is_enabled());

    let target = Pose::from_array([1000.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let outcome = session.submit(gui(CommandKind::SetPosition(target))).await.unwrap();
    assert!(!outcome.observed);

    let outcome = session.submit(gui(move_sync())).await.unwrap();
    assert!(outcome.observed);

    // The controller returns to Stationary on its own once the move ends.
    let view = wait_until(&session, "move complete", |v| {
        v.state() == Some(ControllerState::Enabled(EnabledSubstate::Stationary))
    })
    .await;
    assert_eq!(view.pose().unwrap().x, 1000.0);
    assert_eq!(sim.controller().lock().pose().x, 1000.0);
    assert_eq!(view.rejected_transitions, 0);
}

#[tokio::test]
async fn move_without_target_is_refused() {
    let (session, _sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;
    session.submit(gui(ENABLE)).await.unwrap();

    let err = session.submit(gui(move_sync())).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidCommand { .. }), "{err:?}");
}

#[tokio::test]
async fn target_out_of_range_is_refused() {
    let (session, _sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;
    session.submit(gui(ENABLE)).await.unwrap();

    let far = Pose::from_array([1.0e7, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let err = session.submit(gui(CommandKind::SetPosition(far))).await.unwrap_err();
    assert!(matches!(err, CommandError::OutOfRange { field: "x", .. }), "{err:?}");
}

#[tokio::test]
async fn stop_returns_to_stationary() {
    let (session, _sim) = start(HexapodKind::M2, Arc::new(AlwaysConfirm), 2.0).await;
    session.submit(gui(ENABLE)).await.unwrap();

    let target = Pose::from_array([0.0, 0.0, 5000.0, 0.0, 0.0, 0.0]);
    session.submit(gui(CommandKind::SetPosition(target))).await.unwrap();
    session.submit(gui(move_sync())).await.unwrap();

    let stop = CommandKind::SetEnabledSubstate {
        trigger: SubstateTrigger::Stop,
        pattern: MotionPattern::Sync,
    };
    let outcome = session.submit(gui(stop)).await.unwrap();
    assert!(outcome.observed);
    assert!(session.view().state().unwrap().is_stationary());
    assert!(session.view().pose().unwrap().z < 5000.0);
}

#[tokio::test]
async fn ack_without_effect_times_out() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 0.3).await;
    sim.inject(Injection::AckOnly(true));

    let err = session.submit(gui(ENABLE)).await.unwrap_err();
    assert!(matches!(err, CommandError::Timeout(_)), "{err:?}");
    assert_eq!(session.view().state(), Some(ControllerState::Standby));
}

#[tokio::test]
async fn missing_ack_times_out() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 0.3).await;
    sim.inject(Injection::DropAcks(true));

    let err = session.submit(gui(ENABLE)).await.unwrap_err();
    assert!(matches!(err, CommandError::Timeout(_)), "{err:?}");
    assert_eq!(session.view().state(), Some(ControllerState::Standby));

    // The session stays usable once acknowledgements resume.
    sim.inject(Injection::DropAcks(false));
    session.submit(gui(ENABLE)).await.unwrap();
}

#[tokio::test]
async fn csc_authority_blocks_gui_commands() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;

    let outcome = session
        .submit(gui(CommandKind::SwitchCommandSource(CommandSource::Csc)))
        .await
        .unwrap();
    assert!(outcome.observed);
    assert_eq!(session.view().commander, Some(CommandSource::Csc));

    let err = session.submit(gui(ENABLE)).await.unwrap_err();
    assert_eq!(err, CommandError::NotCommander);
    assert_eq!(sim.controller().lock().state(), ControllerState::Standby);

    // Taking authority back is dangerous and confirmed.
    session
        .submit(gui(CommandKind::SwitchCommandSource(CommandSource::Gui)))
        .await
        .unwrap();
    session.submit(gui(ENABLE)).await.unwrap();
}

#[tokio::test]
async fn declined_authority_switch_is_not_sent() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(NeverConfirm), 2.0).await;
    let _ = sim
        .controller()
        .lock()
        .handle_command(&CommandKind::SwitchCommandSource(CommandSource::Csc).to_wire(1));
    wait_until(&session, "CSC authority", |v| {
        v.commander == Some(CommandSource::Csc)
    })
    .await;

    let err = session
        .submit(gui(CommandKind::SwitchCommandSource(CommandSource::Gui)))
        .await
        .unwrap_err();
    assert_eq!(err, CommandError::Cancelled);
    assert_eq!(session.view().commander, Some(CommandSource::Csc));
}
