//! Controller state tracker.
//!
//! The tracked state follows the controller's reported state, but only
//! along the allowed edges:
//!
//! ```text
//! Standby ──(reported Enabled, no state fault)──► Enabled/Stationary
//! Enabled/Stationary ──(reported substate Moving)──► Enabled/MovingPt2Pt
//! Enabled/MovingPt2Pt ──(reported Stationary or no strut in motion)──► Enabled/Stationary
//! Enabled(any) ──(reported Fault or state fault active)──► Fault
//! Enabled(any) ──(reported Standby)──► Standby
//! Fault ──(reported Standby, no state fault)──► Standby
//! unknown ──(first frame)──► reported state
//! ```
//!
//! Every other observed change is rejected: the tracked state is held and
//! the rejection is counted. Transitions are never taken on command send.

use hexgui_common::controller::{
    ControllerState, EnabledSubstate, FaultSet, LocalState, ReportedFrame, ReportedState,
};
use tracing::{debug, info, warn};

/// Result of applying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Tracked state unchanged.
    Unchanged,
    /// Moved along an allowed edge.
    Ok(ControllerState),
    /// Observed change is not an allowed edge; state held.
    Rejected(&'static str),
}

/// Resynchronized state from a first frame.
fn resync(frame: &ReportedFrame) -> ControllerState {
    match frame.state {
        ReportedState::Standby => ControllerState::Standby,
        ReportedState::Enabled => ControllerState::Enabled(frame.substate),
        ReportedState::Fault => ControllerState::Fault,
    }
}

/// Next tracked state given the current one and a validated frame.
///
/// `faults` is the aggregate after the limit-switch mask was applied.
pub fn transition(current: LocalState, frame: &ReportedFrame, faults: &FaultSet) -> Transition {
    use ControllerState::*;
    use EnabledSubstate::*;

    let state = match current {
        LocalState::Disconnected | LocalState::AwaitingTelemetry => {
            return Transition::Ok(resync(frame));
        }
        LocalState::Known(state) => state,
    };
    let faulted = faults.has_state_fault();

    let next = match (state, frame.state) {
        (Standby, ReportedState::Standby) => return Transition::Unchanged,
        (Standby, ReportedState::Enabled) if !faulted => ControllerState::ENABLED_ENTRY,
        (Standby, ReportedState::Enabled) => {
            return Transition::Rejected("Standby -> Enabled with a fault active");
        }
        (Standby, ReportedState::Fault) => {
            return Transition::Rejected("Standby -> Fault is not an allowed edge");
        }

        (Enabled(_), ReportedState::Fault) => Fault,
        (Enabled(_), _) if faulted => Fault,
        (Enabled(_), ReportedState::Standby) => Standby,
        (Enabled(Stationary), ReportedState::Enabled) => match frame.substate {
            MovingPointToPoint => Enabled(MovingPointToPoint),
            Stationary => return Transition::Unchanged,
        },
        (Enabled(MovingPointToPoint), ReportedState::Enabled) => {
            if frame.substate == Stationary || !frame.any_in_motion() {
                ControllerState::ENABLED_ENTRY
            } else {
                return Transition::Unchanged;
            }
        }

        (Fault, ReportedState::Fault) => return Transition::Unchanged,
        (Fault, ReportedState::Standby) if !faulted => Standby,
        (Fault, ReportedState::Standby) => {
            return Transition::Rejected("Fault -> Standby while faults remain active");
        }
        (Fault, ReportedState::Enabled) => {
            return Transition::Rejected("Fault -> Enabled is not an allowed edge");
        }
    };

    Transition::Ok(next)
}

/// Tracked state of one connection.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    state: LocalState,
    rejected: u64,
    last_rejection: Option<&'static str>,
    /// Rejected (tracked, reported) pair of the previous frame and how many
    /// frames in a row repeated it.
    rejected_run: Option<(LocalState, ReportedState, EnabledSubstate)>,
    run_length: u64,
}

impl StateTracker {
    /// Tracker in the disconnected meta-state.
    pub const fn new() -> Self {
        Self {
            state: LocalState::Disconnected,
            rejected: 0,
            last_rejection: None,
            rejected_run: None,
            run_length: 0,
        }
    }

    #[inline]
    pub const fn state(&self) -> LocalState {
        self.state
    }

    /// Number of rejected transitions since the link came up.
    #[inline]
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }

    #[inline]
    pub const fn last_rejection(&self) -> Option<&'static str> {
        self.last_rejection
    }

    /// Consecutive frames repeating the current rejection.
    #[inline]
    pub const fn rejection_run(&self) -> u64 {
        self.run_length
    }

    /// Link is up; forget any prior state and wait for the first frame.
    pub fn link_up(&mut self) {
        *self = Self {
            state: LocalState::AwaitingTelemetry,
            ..Self::new()
        };
    }

    /// Link is gone.
    pub fn link_down(&mut self) {
        self.state = LocalState::Disconnected;
    }

    /// Apply one frame.
    pub fn apply(&mut self, frame: &ReportedFrame, faults: &FaultSet) -> Transition {
        let result = transition(self.state, frame, faults);
        if !matches!(result, Transition::Rejected(_)) {
            self.rejected_run = None;
            self.run_length = 0;
        }
        match result {
            Transition::Ok(next) => {
                match self.state.controller() {
                    Some(prev) => info!("controller state {} -> {}", prev.name(), next.name()),
                    None => info!("controller state resynchronized: {}", next.name()),
                }
                self.state = LocalState::Known(next);
            }
            Transition::Rejected(reason) => {
                self.rejected += 1;
                self.last_rejection = Some(reason);
                let pair = (self.state, frame.state, frame.substate);
                if self.rejected_run == Some(pair) {
                    self.run_length += 1;
                    debug!(
                        reported = ?frame.state,
                        reason,
                        repeats = self.run_length,
                        "state change still rejected"
                    );
                } else {
                    self.rejected_run = Some(pair);
                    self.run_length = 1;
                    warn!(
                        reported = ?frame.state,
                        substate = ?frame.substate,
                        reason,
                        "state change rejected, holding current state"
                    );
                }
            }
            Transition::Unchanged => {}
        }
        result
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
