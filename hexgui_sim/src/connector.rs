//! In-process simulation transport.
//!
//! [`SimulationConnector`] implements [`Connector`] by spawning a task that
//! drives a shared [`MockController`] at the telemetry rate. The same task
//! body ([`drive_link`]) backs the TCP server, so both transports behave the
//! same way.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hexgui_common::config::ConnectionConfig;
use hexgui_common::consts::TELEMETRY_RATE_HZ;
use hexgui_common::controller::HexapodKind;
use hexgui_common::transport::{Connector, ControllerLink, LinkEndpoint, TransportError};
use hexgui_common::wire::ControllerMessage;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::controller::{Injection, MockController};

/// Mock controller shared between link tasks and test code.
pub type SharedController = Arc<Mutex<MockController>>;

/// TAI - UTC [s].
const TAI_OFFSET: f64 = 37.0;

/// Current TAI time [s].
pub fn current_tai() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
        + TAI_OFFSET
}

/// Serve one link until either side closes it.
///
/// Publishes the configuration first, then a telemetry frame every `period`
/// and an acknowledgement for every command.
pub async fn drive_link(controller: SharedController, mut endpoint: LinkEndpoint, period: Duration) {
    let config = controller.lock().config().clone();
    if endpoint.events.send(Ok(ControllerMessage::Config(config))).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = {
                    let mut mock = controller.lock();
                    if mock.take_link_drop() {
                        info!("dropping simulated link");
                        break;
                    }
                    mock.tick(current_tai())
                };
                if let Some(frame) = frame {
                    let msg = ControllerMessage::Telemetry(Box::new(frame));
                    if endpoint.events.send(Ok(msg)).await.is_err() {
                        break;
                    }
                }
            }
            cmd = endpoint.commands.recv() => {
                let Some(cmd) = cmd else {
                    debug!("client closed the command channel");
                    break;
                };
                let reply = controller.lock().handle_command(&cmd);
                let messages = reply
                    .ack
                    .into_iter()
                    .chain(reply.config.map(ControllerMessage::Config));
                for msg in messages {
                    if endpoint.events.send(Ok(msg)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid telemetry rate {0} Hz")]
pub struct InvalidRate(pub f64);

/// Telemetry period for `rate_hz`; the rate must give a finite, non-zero
/// period.
pub fn telemetry_period(rate_hz: f64) -> Result<Duration, InvalidRate> {
    if !rate_hz.is_finite() {
        return Err(InvalidRate(rate_hz));
    }
    match Duration::try_from_secs_f64(1.0 / rate_hz) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(InvalidRate(rate_hz)),
    }
}

/// Connector backed by an in-process mock controller.
#[derive(Debug, Clone)]
pub struct SimulationConnector {
    controller: SharedController,
    period: Duration,
}

impl SimulationConnector {
    pub fn new(hexapod: HexapodKind) -> Self {
        Self::with_period(hexapod, Duration::from_secs_f64(1.0 / TELEMETRY_RATE_HZ))
    }

    /// Connector publishing telemetry at `rate_hz`.
    pub fn with_rate(hexapod: HexapodKind, rate_hz: f64) -> Result<Self, InvalidRate> {
        Ok(Self::with_period(hexapod, telemetry_period(rate_hz)?))
    }

    fn with_period(hexapod: HexapodKind, period: Duration) -> Self {
        Self {
            controller: Arc::new(Mutex::new(MockController::new(hexapod))),
            period,
        }
    }

    /// Handle to the simulated controller, shared with every link.
    pub fn controller(&self) -> SharedController {
        Arc::clone(&self.controller)
    }

    /// Shortcut for `controller().lock().inject(..)`.
    pub fn inject(&self, injection: Injection) {
        self.controller.lock().inject(injection);
    }
}

#[async_trait]
impl Connector for SimulationConnector {
    fn name(&self) -> &'static str {
        "simulation"
    }

    async fn connect(&self, _config: &ConnectionConfig) -> Result<ControllerLink, TransportError> {
        let hexapod = self.controller.lock().hexapod();
        info!(?hexapod, "connecting to simulated controller");
        let (link, endpoint) = ControllerLink::pair();
        tokio::spawn(drive_link(self.controller(), endpoint, self.period));
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexgui_common::controller::{CommandKind, StateTrigger};

    async fn next_non_telemetry(link: &mut ControllerLink) -> ControllerMessage {
        loop {
            match link.events.recv().await {
                Some(Ok(ControllerMessage::Telemetry(_))) => continue,
                Some(Ok(msg)) => return msg,
                other => panic!("link ended: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn config_first_then_telemetry() {
        let connector = SimulationConnector::with_rate(HexapodKind::M2, 100.0).unwrap();
        let mut link = connector.connect(&ConnectionConfig::default()).await.unwrap();

        assert!(matches!(
            link.events.recv().await,
            Some(Ok(ControllerMessage::Config(_)))
        ));
        assert!(matches!(
            link.events.recv().await,
            Some(Ok(ControllerMessage::Telemetry(_)))
        ));
    }

    #[tokio::test]
    async fn command_is_acknowledged() {
        let connector = SimulationConnector::with_rate(HexapodKind::Camera, 100.0).unwrap();
        let mut link = connector.connect(&ConnectionConfig::default()).await.unwrap();
        let _config = next_non_telemetry(&mut link).await;

        let cmd = CommandKind::SetState(StateTrigger::Enable).to_wire(11);
        link.commands.send(cmd).await.unwrap();
        assert_eq!(
            next_non_telemetry(&mut link).await,
            ControllerMessage::accepted(11)
        );
        assert!(connector.controller().lock().state().is_enabled());
    }

    #[tokio::test]
    async fn drop_link_closes_events() {
        let connector = SimulationConnector::with_rate(HexapodKind::M2, 100.0).unwrap();
        let mut link = connector.connect(&ConnectionConfig::default()).await.unwrap();
        connector.inject(Injection::DropLink);

        let mut received = 0;
        while link.events.recv().await.is_some() {
            received += 1;
            assert!(received < 1000);
        }
    }

    #[test]
    fn unusable_rates_are_rejected() {
        assert_eq!(telemetry_period(20.0), Ok(Duration::from_millis(50)));
        for rate in [0.0, -20.0, f64::NAN, f64::INFINITY, 1e-300, 1e300] {
            assert!(telemetry_period(rate).is_err(), "{rate}");
        }
        assert_eq!(
            SimulationConnector::with_rate(HexapodKind::M2, 0.0).unwrap_err(),
            InvalidRate(0.0)
        );
    }
}
