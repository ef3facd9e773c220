//! Per-frame telemetry pipeline.
//!
//! Each frame is validated first; only a valid frame touches any state.
//! It is then applied in one step, in this order:
//!
//! 1. fault aggregation (all status registers → active fault set)
//! 2. limit-switch mask (suppress or auto-unmask)
//! 3. state transition
//! 4. rate statistics and the published view
//!
//! Frames are applied in arrival order; a frame with an older timestamp is
//! still applied and only counted by the rate monitor.

use hexgui_common::config::HexguiConfig;
use hexgui_common::controller::{
    CommandSource, ControllerConfig, FaultSet, FrameError, LimitDirection, TelemetryFrame,
};
use tracing::debug;

use crate::fault::{observe, FaultAggregator, LimitMask, MaskUpdate};
use crate::session::view::ControllerView;
use crate::state::{StateTracker, Transition};
use crate::telemetry::rate::RateMonitor;

/// What one frame changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOutcome {
    pub transition: Transition,
    pub mask: MaskUpdate,
    /// Delta to the previous frame [s].
    pub delta: Option<f64>,
}

/// Telemetry-derived state of one session.
#[derive(Debug, Clone)]
pub struct Ingest {
    tracker: StateTracker,
    aggregator: FaultAggregator,
    mask: LimitMask,
    rate: RateMonitor,
    /// Strut travel from the local configuration, until the controller
    /// publishes its own.
    default_travel: f64,
    faults: FaultSet,
    commander: Option<CommandSource>,
    latest: Option<Box<TelemetryFrame>>,
    config: Option<ControllerConfig>,
}

impl Ingest {
    pub fn new(config: &HexguiConfig) -> Self {
        Self {
            tracker: StateTracker::new(),
            aggregator: FaultAggregator::new(),
            mask: LimitMask::new(),
            rate: RateMonitor::new(config.telemetry.nominal_period()),
            default_travel: config.limits.strut_travel,
            faults: FaultSet::new(),
            commander: None,
            latest: None,
            config: None,
        }
    }

    /// New link: nothing from the previous one carries over.
    pub fn link_up(&mut self) {
        self.reset();
        self.tracker.link_up();
    }

    pub fn link_down(&mut self) {
        self.reset();
        self.tracker.link_down();
    }

    fn reset(&mut self) {
        self.aggregator.reset();
        self.mask.clear();
        self.rate.reset();
        self.faults = FaultSet::new();
        self.commander = None;
        self.latest = None;
        self.config = None;
    }

    #[inline]
    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    #[inline]
    pub fn faults(&self) -> &FaultSet {
        &self.faults
    }

    #[inline]
    pub fn masked(&self) -> Option<LimitDirection> {
        self.mask.masked()
    }

    /// Normal strut travel [µm].
    pub fn travel(&self) -> f64 {
        self.config
            .as_ref()
            .map_or(self.default_travel, |c| c.max_displacement_strut)
    }

    /// Apply one frame.
    ///
    /// # Errors
    ///
    /// [`FrameError`] if the frame does not decode; nothing is changed.
    pub fn apply_frame(&mut self, frame: TelemetryFrame) -> Result<IngestOutcome, FrameError> {
        let reported = frame.decode()?;

        let obs = observe(&frame);
        let mut faults = self.aggregator.update(&obs, reported.timestamp).clone();
        let mask = self.mask.apply(&frame, self.travel(), &mut faults);
        let transition = self.tracker.apply(&reported, &faults);
        let delta = self.rate.record(reported.timestamp);

        if self.commander != Some(reported.commander) {
            debug!(commander = ?reported.commander, "command source changed");
        }
        self.commander = Some(reported.commander);
        self.faults = faults;
        self.latest = Some(Box::new(frame));

        Ok(IngestOutcome {
            transition,
            mask,
            delta,
        })
    }

    pub fn apply_config(&mut self, config: ControllerConfig) {
        debug!(?config, "controller configuration");
        self.config = Some(config);
    }

    /// Arm the mask once the controller acknowledged it.
    pub fn arm_mask(&mut self, direction: LimitDirection) {
        self.mask.arm(direction);
    }

    /// Snapshot for publication.
    pub fn view(&self) -> ControllerView {
        ControllerView {
            local: self.tracker.state(),
            commander: self.commander,
            faults: self.faults.clone(),
            masked: self.mask.masked(),
            telemetry: self.latest.clone(),
            config: self.config.clone(),
            rate: self.rate.stats(),
            rejected_transitions: self.tracker.rejected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexgui_common::controller::{
        ApplicationStatus, ControllerState, EnabledSubstate, FaultCode, LatchingFault,
        LocalState, StatusWord,
    };

    fn ingest() -> Ingest {
        let mut ingest = Ingest::new(&HexguiConfig::default());
        ingest.link_up();
        ingest
    }

    fn frame(t: f64, state: u8, substate: u8) -> TelemetryFrame {
        TelemetryFrame {
            timestamp: t,
            state,
            enabled_substate: substate,
            ..Default::default()
        }
    }

    fn moving(t: f64, in_motion: bool) -> TelemetryFrame {
        let mut f = frame(t, 2, 1);
        for word in &mut f.status_word {
            if in_motion {
                *word |= StatusWord::IN_MOTION.bits();
            }
        }
        f
    }

    #[test]
    fn invalid_frame_changes_nothing() {
        let mut ingest = ingest();
        ingest.apply_frame(frame(1.0, 0, 0)).unwrap();
        let before = ingest.view();

        let mut bad = frame(1.05, 2, 0);
        bad.strut_position[3] = f64::NAN;
        assert!(ingest.apply_frame(bad).is_err());
        assert!(ingest.apply_frame(frame(1.1, 7, 0)).is_err());
        assert_eq!(ingest.view(), before);
    }

    #[test]
    fn motion_ends_when_in_motion_flags_clear() {
        let mut ingest = ingest();
        ingest.apply_frame(frame(0.0, 2, 0)).unwrap();
        ingest.apply_frame(moving(0.05, true)).unwrap();
        assert_eq!(
            ingest.tracker().state(),
            LocalState::Known(ControllerState::Enabled(EnabledSubstate::MovingPointToPoint))
        );

        let outcome = ingest.apply_frame(moving(0.10, false)).unwrap();
        assert_eq!(outcome.transition, Transition::Ok(ControllerState::ENABLED_ENTRY));
    }

    #[test]
    fn fault_is_aggregated_before_transition() {
        let mut ingest = ingest();
        ingest.apply_frame(frame(0.0, 2, 0)).unwrap();

        // Controller still reports Enabled, but a recoverable fault is active.
        let mut f = frame(0.05, 2, 0);
        f.application_status |= ApplicationStatus::SAFETY_INTERLOCK.bits();
        let outcome = ingest.apply_frame(f).unwrap();
        assert_eq!(outcome.transition, Transition::Ok(ControllerState::Fault));
        assert!(ingest.faults().contains(FaultCode::SafetyInterlock));
    }

    #[test]
    fn masked_limit_switch_does_not_fault() {
        let mut ingest = ingest();
        ingest.apply_frame(frame(0.0, 2, 0)).unwrap();
        ingest.arm_mask(LimitDirection::Extend);

        let travel = ingest.travel();
        let mut f = frame(0.05, 2, 0);
        f.application_status |= ApplicationStatus::EXTEND_LIMIT_SWITCH.bits();
        f.strut_position[0] = travel + 50.0;
        let outcome = ingest.apply_frame(f).unwrap();
        assert_eq!(outcome.transition, Transition::Unchanged);
        assert!(ingest.faults().is_empty());

        let outcome = ingest.apply_frame(frame(0.10, 2, 0)).unwrap();
        assert_eq!(outcome.mask, MaskUpdate::Unmasked(LimitDirection::Extend));
        assert_eq!(ingest.masked(), None);
    }

    #[test]
    fn latched_fault_blocks_return_to_standby() {
        let mut ingest = ingest();
        let mut f = frame(0.0, 3, 0);
        f.latching_fault[1] = LatchingFault::DATA_FLASH_CRC.bits();
        ingest.apply_frame(f.clone()).unwrap();
        assert_eq!(ingest.tracker().state(), LocalState::Known(ControllerState::Fault));

        // Even if the controller claimed Standby, the latched bit holds Fault.
        f.state = 0;
        f.timestamp = 0.05;
        let outcome = ingest.apply_frame(f).unwrap();
        assert!(matches!(outcome.transition, Transition::Rejected(_)));
        assert_eq!(ingest.view().rejected_transitions, 1);
    }

    #[test]
    fn link_down_forgets_everything() {
        let mut ingest = ingest();
        ingest.arm_mask(LimitDirection::Retract);
        ingest.apply_frame(frame(0.0, 2, 0)).unwrap();
        ingest.link_down();

        let view = ingest.view();
        assert_eq!(view.local, LocalState::Disconnected);
        assert_eq!(view.masked, None);
        assert!(view.telemetry.is_none());
        assert_eq!(view.rate.frames, 0);
    }
}
