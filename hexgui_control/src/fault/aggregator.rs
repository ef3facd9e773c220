//! Status register → fault taxonomy mapping.
//!
//! Each frame is scanned register by register. Controller-wide sources
//! (application status) raise a fault without a strut; per-drive registers
//! record which struts report it. The aggregate is the union of all
//! sources, so several faults can be active at once.

use hexgui_common::consts::NUM_STRUT;
use hexgui_common::controller::{
    ApplicationStatus, CopleyStatus, FaultCode, FaultEntry, FaultFlags, FaultSet, LatchingFault,
    StatusWord, StrutMask, TelemetryFrame,
};
use tracing::{info, warn};

// ─── Bit tables ─────────────────────────────────────────────────────

const APPLICATION_STATUS: [(ApplicationStatus, FaultCode); 9] = [
    (ApplicationStatus::FOLLOWING_ERROR, FaultCode::FollowingError),
    (ApplicationStatus::SAFETY_INTERLOCK, FaultCode::SafetyInterlock),
    (ApplicationStatus::EXTEND_LIMIT_SWITCH, FaultCode::LimitSwitchPositive),
    (ApplicationStatus::RETRACT_LIMIT_SWITCH, FaultCode::LimitSwitchNegative),
    (ApplicationStatus::ETHERCAT_PROBLEM, FaultCode::EthercatNotReady),
    (ApplicationStatus::MOTION_TIMEOUT, FaultCode::MotionTimeout),
    (ApplicationStatus::INVALID_COMMAND, FaultCode::InvalidCommand),
    (ApplicationStatus::DRIVE_FAULT, FaultCode::DriveFault),
    (ApplicationStatus::SIMULINK_FAULT, FaultCode::SimulinkFault),
];

const STATUS_WORD: [(StatusWord, FaultCode); 3] = [
    (StatusWord::FAULT_LATCHED, FaultCode::DriveFault),
    (StatusWord::INTERNAL_LIMIT_ACTIVE, FaultCode::InternalLimit),
    (StatusWord::FOLLOWING_ERROR, FaultCode::FollowingError),
];

const LATCHING_FAULT: [(LatchingFault, FaultCode); 16] = [
    (LatchingFault::DATA_FLASH_CRC, FaultCode::DataFlashCrcFailure),
    (LatchingFault::AMPLIFIER_INTERNAL, FaultCode::AmplifierInternalError),
    (LatchingFault::SHORT_CIRCUIT, FaultCode::ShortCircuit),
    (LatchingFault::AMPLIFIER_OVER_TEMP, FaultCode::AmplifierOverTemperature),
    (LatchingFault::MOTOR_OVER_TEMP, FaultCode::DriveFault),
    (LatchingFault::OVER_VOLTAGE, FaultCode::OverVoltage),
    (LatchingFault::UNDER_VOLTAGE, FaultCode::UnderVoltage),
    (LatchingFault::FEEDBACK, FaultCode::FeedbackError),
    (LatchingFault::PHASING, FaultCode::MotorPhasingError),
    (LatchingFault::TRACKING, FaultCode::FollowingError),
    (LatchingFault::OVER_CURRENT, FaultCode::DriveFault),
    (LatchingFault::FPGA_1, FaultCode::FpgaFailure),
    (LatchingFault::COMMAND_INPUT_LOST, FaultCode::DriveFault),
    (LatchingFault::FPGA_2, FaultCode::FpgaFailure),
    (LatchingFault::SAFETY_CIRCUIT, FaultCode::DriveFault),
    (LatchingFault::CURRENT_CONTROL_LOST, FaultCode::DriveFault),
];

const COPLEY_STATUS: [(CopleyStatus, FaultCode); 16] = [
    (CopleyStatus::SHORT_CIRCUIT, FaultCode::ShortCircuit),
    (CopleyStatus::AMPLIFIER_OVER_TEMP, FaultCode::AmplifierOverTemperature),
    (CopleyStatus::OVER_VOLTAGE, FaultCode::OverVoltage),
    (CopleyStatus::UNDER_VOLTAGE, FaultCode::UnderVoltage),
    (CopleyStatus::FEEDBACK_ERROR, FaultCode::FeedbackError),
    (CopleyStatus::PHASING_ERROR, FaultCode::MotorPhasingError),
    (CopleyStatus::VOLTAGE_LIMITED, FaultCode::VoltageOutputLimited),
    (CopleyStatus::RETRACT_LIMIT_ACTIVE, FaultCode::LimitSwitchNegative),
    (CopleyStatus::EXTEND_LIMIT_ACTIVE, FaultCode::LimitSwitchPositive),
    (CopleyStatus::TRACKING_ERROR, FaultCode::FollowingError),
    (CopleyStatus::POSITION_WRAPPED, FaultCode::PositionCountsWrapped),
    (CopleyStatus::AMPLIFIER_FAULT, FaultCode::DriveFault),
    (CopleyStatus::AT_VELOCITY_LIMIT, FaultCode::AtVelocityAccelerationLimit),
    (CopleyStatus::AT_ACCEL_LIMIT, FaultCode::AtVelocityAccelerationLimit),
    (CopleyStatus::PHASING_NOT_SET, FaultCode::MotorPhasingError),
    (CopleyStatus::COMMAND_FAULT, FaultCode::DriveFault),
];

// ─── Observation ────────────────────────────────────────────────────

/// Faults reported by a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    flags: FaultFlags,
    struts: [StrutMask; FaultCode::COUNT],
}

impl Observation {
    fn mark(&mut self, code: FaultCode, strut: Option<usize>) {
        self.flags |= code.flag();
        if let Some(strut) = strut {
            self.struts[code as usize] |= 1 << strut;
        }
    }

    #[inline]
    pub const fn flags(&self) -> FaultFlags {
        self.flags
    }

    /// Struts reporting `code`; zero for controller-wide sources only.
    #[inline]
    pub const fn struts(&self, code: FaultCode) -> StrutMask {
        self.struts[code as usize]
    }
}

/// Map every status register of `frame` onto the taxonomy.
pub fn observe(frame: &TelemetryFrame) -> Observation {
    let mut obs = Observation::default();

    let app = frame.app_status();
    for (bit, code) in APPLICATION_STATUS {
        if app.contains(bit) {
            obs.mark(code, None);
        }
    }

    for strut in 0..NUM_STRUT {
        let word = frame.status_word_of(strut);
        for (bit, code) in STATUS_WORD {
            if word.contains(bit) {
                obs.mark(code, Some(strut));
            }
        }

        let latching = frame.latching_fault_of(strut);
        for (bit, code) in LATCHING_FAULT {
            if latching.contains(bit) {
                obs.mark(code, Some(strut));
            }
        }

        let copley = frame.copley_status_of(strut);
        for (bit, code) in COPLEY_STATUS {
            if copley.contains(bit) {
                obs.mark(code, Some(strut));
            }
        }

        let pins = frame.pins_of(strut);
        if !pins.interlock_ok {
            obs.mark(FaultCode::SafetyInterlock, Some(strut));
        }
        if pins.extend_limit_hit {
            obs.mark(FaultCode::LimitSwitchPositive, Some(strut));
        }
        if pins.retract_limit_hit {
            obs.mark(FaultCode::LimitSwitchNegative, Some(strut));
        }
    }

    obs
}

// ─── Aggregator ─────────────────────────────────────────────────────

/// Active faults across frames.
///
/// A fault stays in the set exactly as long as frames keep reporting it;
/// its `first_seen` is the timestamp of the first frame in that run.
#[derive(Debug, Clone, Default)]
pub struct FaultAggregator {
    active: FaultSet,
}

impl FaultAggregator {
    pub const fn new() -> Self {
        Self {
            active: FaultSet::new(),
        }
    }

    #[inline]
    pub fn active(&self) -> &FaultSet {
        &self.active
    }

    /// Forget everything (link lost).
    pub fn reset(&mut self) {
        self.active = FaultSet::new();
    }

    /// Replace the aggregate with the faults in `obs`.
    pub fn update(&mut self, obs: &Observation, timestamp: f64) -> &FaultSet {
        let mut next = FaultSet::new();
        for code in FaultCode::ALL {
            if !obs.flags().contains(code.flag()) {
                continue;
            }
            let first_seen = match self.active.get(code) {
                Some(prev) => prev.first_seen,
                None => {
                    warn!(fault = code.name(), struts = obs.struts(code), "fault raised");
                    timestamp
                }
            };
            next.upsert(FaultEntry::new(code, obs.struts(code), first_seen));
        }

        for gone in self.active.iter().filter(|e| !next.contains(e.code)) {
            info!(fault = gone.code.name(), "fault cleared");
        }

        self.active = next;
        &self.active
    }
}
