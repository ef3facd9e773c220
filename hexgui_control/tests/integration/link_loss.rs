//! Integration test: link loss, watchdog and reconnect.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hexgui_common::controller::{CommandKind, ControllerState, HexapodKind, LocalState, StateTrigger};
use hexgui_control::{AlwaysConfirm, CommandError, Confirm, NeverConfirm, SessionError};
use hexgui_sim::Injection;

use super::{gui, start, wait_until};

const ENABLE: CommandKind = CommandKind::SetState(StateTrigger::Enable);

#[tokio::test]
async fn dropped_link_fails_the_pending_command() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;
    sim.inject(Injection::DropAcks(true));

    let (result, ()) = tokio::join!(session.submit(gui(ENABLE)), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        sim.inject(Injection::DropLink);
    });
    assert_eq!(result.unwrap_err(), CommandError::Disconnected);

    let view = wait_until(&session, "link loss", |v| !v.is_connected()).await;
    assert_eq!(view.local, LocalState::Disconnected);
    assert!(view.faults.is_empty());
}

#[tokio::test]
async fn reconnect_resyncs_from_the_first_frame() {
    let (session, sim) = start(HexapodKind::M2, Arc::new(AlwaysConfirm), 2.0).await;
    session.submit(gui(ENABLE)).await.unwrap();

    sim.inject(Injection::DropLink);
    wait_until(&session, "link loss", |v| !v.is_connected()).await;
    let err = session.submit(gui(ENABLE)).await.unwrap_err();
    assert_eq!(err, CommandError::Disconnected);

    // The controller moved on while no one was watching.
    sim.inject(Injection::InterlockOpen(true));

    session.connect().await.unwrap();
    let view = wait_until(&session, "resync", |v| v.state().is_some()).await;
    assert_eq!(view.state(), Some(ControllerState::Fault));
    assert_eq!(view.rejected_transitions, 0);
}

#[tokio::test]
async fn silent_controller_trips_the_watchdog() {
    let (session, sim) = start(HexapodKind::Camera, Arc::new(AlwaysConfirm), 2.0).await;

    sim.inject(Injection::Silence(true));
    wait_until(&session, "stale telemetry", |v| !v.is_connected()).await;

    let err = session.submit(gui(ENABLE)).await.unwrap_err();
    assert_eq!(err, CommandError::Disconnected);
}

#[tokio::test]
async fn disconnect_with_authority_asks_first() {
    let (session, _sim) = start(HexapodKind::Camera, Arc::new(NeverConfirm), 2.0).await;

    let err = session.disconnect().await.unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert!(session.is_linked());
    assert!(session.view().is_connected());
}

#[tokio::test]
async fn confirmed_disconnect_closes_the_link() {
    let asked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&asked);
    let confirm: Arc<dyn Confirm> = Arc::new(move |_prompt: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    });
    let (session, _sim) = start(HexapodKind::Camera, confirm, 2.0).await;

    session.disconnect().await.unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert!(!session.is_linked());
    assert_eq!(session.view().local, LocalState::Disconnected);

    // A second disconnect has nothing to close and asks nothing.
    session.disconnect().await.unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 1);
}
