//! Shared helpers for the session integration tests.

mod link_loss;
mod recovery;
mod state_scenarios;
mod tcp_link;

use std::sync::Arc;
use std::time::Duration;

use hexgui_common::config::HexguiConfig;
use hexgui_common::controller::{CommandKind, CommandRequest, HexapodKind};
use hexgui_control::{Confirm, ControllerView, Session};
use hexgui_sim::SimulationConnector;

/// Simulated telemetry rate [Hz].
pub const RATE_HZ: f64 = 100.0;

/// Upper bound for any awaited view change.
const WAIT: Duration = Duration::from_secs(5);

/// Load a configuration from a TOML file in a temporary directory.
pub fn config(command_timeout: f64) -> HexguiConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hexgui.toml");
    let toml = format!(
        "[connection]\n\
         timeout_connection = 1.0\n\
         \n\
         [command]\n\
         timeout = {command_timeout:?}\n\
         \n\
         [telemetry]\n\
         nominal_rate_hz = {RATE_HZ:?}\n\
         stale_timeout = 0.5\n"
    );
    std::fs::write(&path, toml).unwrap();
    HexguiConfig::load_or_default(&path).unwrap()
}

/// Connect a session to a fresh simulated controller and wait for the first
/// telemetry frame.
pub async fn start(
    hexapod: HexapodKind,
    confirm: Arc<dyn Confirm>,
    command_timeout: f64,
) -> (Session, SimulationConnector) {
    let sim = SimulationConnector::with_rate(hexapod, RATE_HZ).unwrap();
    let session = Session::new(
        config(command_timeout),
        hexapod,
        Arc::new(sim.clone()),
        confirm,
    );
    session.connect().await.unwrap();
    wait_until(&session, "first telemetry", |v| v.state().is_some()).await;
    (session, sim)
}

/// Block until the published view satisfies `done`.
pub async fn wait_until(
    session: &Session,
    what: &str,
    done: impl Fn(&ControllerView) -> bool,
) -> ControllerView {
    let mut rx = session.subscribe();
    let waited = tokio::time::timeout(WAIT, async {
        rx.wait_for(|v| done(v)).await.map(|v| v.clone())
    })
    .await;
    match waited {
        Ok(Ok(view)) => view,
        Ok(Err(_)) => panic!("view channel closed while waiting for {what}"),
        Err(_) => panic!("timed out waiting for {what}: {}", session.view().summary()),
    }
}

pub const fn gui(kind: CommandKind) -> CommandRequest {
    CommandRequest::gui(kind)
}
