//! Integration test: full session over TCP against the mock server.

use std::sync::Arc;
use std::time::Duration;

use hexgui_common::controller::{
    CommandKind, ControllerState, EnabledSubstate, HexapodKind, LocalState, MotionPattern, Pose,
    StateTrigger, SubstateTrigger,
};
use hexgui_common::transport::TransportError;
use hexgui_control::{AlwaysConfirm, Session, SessionError, TcpConnector};
use hexgui_sim::{server, MockController};
use parking_lot::Mutex;

use super::{config, gui, wait_until, RATE_HZ};

#[tokio::test]
async fn move_over_tcp() {
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let controller = Arc::new(Mutex::new(MockController::new(HexapodKind::Camera)));
    tokio::spawn(server::serve(
        listener,
        Arc::clone(&controller),
        Duration::from_secs_f64(1.0 / RATE_HZ),
    ));

    let mut config = config(2.0);
    config.connection.host = addr.ip().to_string();
    config.connection.port = addr.port();
    let session = Session::new(
        config,
        HexapodKind::Camera,
        Arc::new(TcpConnector::new()),
        Arc::new(AlwaysConfirm),
    );
    session.connect().await.unwrap();
    wait_until(&session, "first telemetry", |v| v.state().is_some()).await;

    session
        .submit(gui(CommandKind::SetState(StateTrigger::Enable)))
        .await
        .unwrap();
    let offset = Pose::from_array([0.0, -400.0, 0.0, 0.0, 0.0, 0.0]);
    session
        .submit(gui(CommandKind::SetPositionOffset(offset)))
        .await
        .unwrap();
    session
        .submit(gui(CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Move,
            pattern: MotionPattern::Sync,
        }))
        .await
        .unwrap();

    let view = wait_until(&session, "move complete", |v| {
        v.state() == Some(ControllerState::Enabled(EnabledSubstate::Stationary))
    })
    .await;
    assert_eq!(view.pose().unwrap().y, -400.0);
    assert_eq!(controller.lock().pose().y, -400.0);

    session.disconnect().await.unwrap();
    assert_eq!(session.view().local, LocalState::Disconnected);
}

#[tokio::test]
async fn nothing_listening_is_refused() {
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = config(2.0);
    config.connection.host = addr.ip().to_string();
    config.connection.port = addr.port();
    let session = Session::new(
        config,
        HexapodKind::M2,
        Arc::new(TcpConnector::new()),
        Arc::new(AlwaysConfirm),
    );

    let err = session.connect().await.unwrap_err();
    assert!(
        matches!(err, SessionError::Transport(TransportError::ConnectRefused(_))),
        "{err:?}"
    );
    assert!(!session.is_linked());
}
