//! Limit-switch mask.
//!
//! Recovering from a limit-switch fault means commanding the strut back
//! off the switch, which the fault itself would block. The operator masks
//! one switch direction; the mask suppresses that fault class and lifts
//! itself once every strut is back within normal travel and no strut
//! reports that switch as hit.

use hexgui_common::controller::{FaultCode, FaultSet, LimitDirection, TelemetryFrame};
use tracing::info;

/// Outcome of applying the mask to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskUpdate {
    Unchanged,
    /// The mask lifted itself this frame.
    Unmasked(LimitDirection),
}

/// Fault class suppressed when `direction` is masked.
pub const fn masked_code(direction: LimitDirection) -> FaultCode {
    match direction {
        LimitDirection::Extend => FaultCode::LimitSwitchPositive,
        LimitDirection::Retract => FaultCode::LimitSwitchNegative,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitMask {
    masked: Option<LimitDirection>,
}

impl LimitMask {
    pub const fn new() -> Self {
        Self { masked: None }
    }

    #[inline]
    pub const fn masked(&self) -> Option<LimitDirection> {
        self.masked
    }

    /// Arm the mask (after the controller acknowledged it).
    pub fn arm(&mut self, direction: LimitDirection) {
        info!(?direction, "limit switch masked");
        self.masked = Some(direction);
    }

    pub fn clear(&mut self) {
        self.masked = None;
    }

    /// Suppress the masked class in `faults`, or lift the mask.
    ///
    /// `travel` is the normal strut travel [µm], symmetric about zero.
    pub fn apply(&mut self, frame: &TelemetryFrame, travel: f64, faults: &mut FaultSet) -> MaskUpdate {
        let Some(direction) = self.masked else {
            return MaskUpdate::Unchanged;
        };
        let code = masked_code(direction);

        let within_travel = frame.strut_position.iter().all(|p| p.abs() <= travel);
        if within_travel && !faults.contains(code) {
            info!(?direction, "limit switch unmasked, struts within travel");
            self.masked = None;
            return MaskUpdate::Unmasked(direction);
        }

        faults.remove(code);
        MaskUpdate::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexgui_common::consts::NUM_STRUT;
    use hexgui_common::controller::FaultEntry;

    const TRAVEL: f64 = 14_100.0;

    fn limit_faults() -> FaultSet {
        let mut set = FaultSet::new();
        set.upsert(FaultEntry::new(FaultCode::LimitSwitchPositive, 1 << 2, 0.0));
        set.upsert(FaultEntry::new(FaultCode::LimitSwitchNegative, 1 << 0, 0.0));
        set
    }

    fn frame_with_strut(strut: usize, position: f64) -> TelemetryFrame {
        let mut frame = TelemetryFrame::default();
        frame.strut_position[strut] = position;
        frame
    }

    #[test]
    fn unarmed_mask_does_nothing() {
        let mut mask = LimitMask::new();
        let mut faults = limit_faults();
        let update = mask.apply(&TelemetryFrame::default(), TRAVEL, &mut faults);
        assert_eq!(update, MaskUpdate::Unchanged);
        assert_eq!(faults, limit_faults());
    }

    #[test]
    fn suppresses_only_the_masked_direction() {
        let mut mask = LimitMask::new();
        mask.arm(LimitDirection::Extend);
        let mut faults = limit_faults();
        mask.apply(&frame_with_strut(2, TRAVEL + 100.0), TRAVEL, &mut faults);

        assert!(!faults.contains(FaultCode::LimitSwitchPositive));
        assert!(faults.contains(FaultCode::LimitSwitchNegative));
        assert_eq!(mask.masked(), Some(LimitDirection::Extend));
    }

    #[test]
    fn stays_armed_while_switch_reports_hit() {
        let mut mask = LimitMask::new();
        mask.arm(LimitDirection::Extend);
        // Position back in travel but the switch still reads hit.
        let mut faults = limit_faults();
        mask.apply(&frame_with_strut(2, TRAVEL - 10.0), TRAVEL, &mut faults);
        assert_eq!(mask.masked(), Some(LimitDirection::Extend));
    }

    #[test]
    fn unmasks_once_back_within_travel() {
        let mut mask = LimitMask::new();
        mask.arm(LimitDirection::Retract);
        let mut faults = FaultSet::new();
        let update = mask.apply(&frame_with_strut(0, -TRAVEL), TRAVEL, &mut faults);
        assert_eq!(update, MaskUpdate::Unmasked(LimitDirection::Retract));
        assert_eq!(mask.masked(), None);

        mask.arm(LimitDirection::Retract);
        let mut faults = FaultSet::new();
        let frame = TelemetryFrame {
            strut_position: [-TRAVEL - 1.0; NUM_STRUT],
            ..Default::default()
        };
        assert_eq!(mask.apply(&frame, TRAVEL, &mut faults), MaskUpdate::Unchanged);
    }
}
