//! Published controller view.
//!
//! The I/O task is the only writer; everyone else reads snapshots through a
//! `tokio::sync::watch` channel, so a command eligibility check never
//! observes a half-applied frame.

use hexgui_common::controller::{
    CommandSource, ControllerConfig, ControllerState, FaultSet, LimitDirection, LocalState, Pose,
    TelemetryFrame,
};
use serde::Serialize;

use crate::telemetry::rate::RateStats;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerView {
    pub local: LocalState,
    /// Source holding command authority, from the latest frame.
    pub commander: Option<CommandSource>,
    /// Active faults after the limit-switch mask.
    pub faults: FaultSet,
    pub masked: Option<LimitDirection>,
    pub telemetry: Option<Box<TelemetryFrame>>,
    /// Configuration last published by the controller.
    pub config: Option<ControllerConfig>,
    pub rate: RateStats,
    /// Reported changes the tracker refused since the link came up.
    pub rejected_transitions: u64,
}

impl ControllerView {
    /// View of a session with no link.
    pub fn disconnected() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> Option<ControllerState> {
        self.local.controller()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.local.is_connected()
    }

    /// Latest reported pose.
    pub fn pose(&self) -> Option<Pose> {
        self.telemetry.as_ref().map(|t| t.pose)
    }

    /// Latest strut positions [µm].
    pub fn strut_positions(&self) -> Option<[f64; 6]> {
        self.telemetry.as_ref().map(|t| t.strut_position)
    }

    /// One-line operator summary.
    pub fn summary(&self) -> String {
        let state = match self.local {
            LocalState::Disconnected => "Disconnected".to_string(),
            LocalState::AwaitingTelemetry => "Connected, waiting for telemetry".to_string(),
            LocalState::Known(s) => s.name().to_string(),
        };
        let commander = match self.commander {
            Some(CommandSource::Gui) => " | commander GUI",
            Some(CommandSource::Csc) => " | commander CSC",
            None => "",
        };
        let faults = if self.faults.is_empty() {
            String::new()
        } else {
            let names: Vec<_> = self.faults.iter().map(|f| f.code.name()).collect();
            format!(" | faults: {}", names.join(", "))
        };
        format!("{state}{commander}{faults}")
    }
}
