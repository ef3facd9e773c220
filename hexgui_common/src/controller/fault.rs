//! Fault taxonomy.
//!
//! Every fault the controller can report falls into one [`FaultCode`].
//! Codes are grouped by [`FaultSeverity`]:
//!
//! - `Latched`: needs an external power cycle; software cannot clear it.
//! - `Recoverable`: cleared by a clear-error command once the condition is gone.
//! - `Advisory`: shown to the operator, no state transition.
//! - `System`: the controller process itself must be restarted.
//!
//! [`FaultFlags`] is the compact per-frame bit set; [`FaultSet`] is the
//! aggregate with per-fault detail kept across frames.

use bitflags::bitflags;
use serde::Serialize;

use crate::consts::NUM_STRUT;

/// Severity class of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultSeverity {
    Latched,
    Recoverable,
    Advisory,
    System,
}

impl FaultSeverity {
    /// Whether faults of this class drive the controller into `Fault`.
    #[inline]
    pub const fn is_state_fault(&self) -> bool {
        !matches!(self, Self::Advisory)
    }
}

bitflags! {
    /// One bit per fault code.
    ///
    /// LATCHED flags need a power cycle; SYSTEM flags need a controller
    /// restart; ADVISORY flags never cause a state transition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaultFlags: u32 {
        const SAFETY_INTERLOCK            = 1 << 0;
        const LIMIT_SWITCH_POSITIVE       = 1 << 1;
        const LIMIT_SWITCH_NEGATIVE       = 1 << 2;
        const FOLLOWING_ERROR             = 1 << 3;
        /// **SYSTEM**.
        const ETHERCAT_NOT_READY          = 1 << 4;
        const SIMULINK_FAULT              = 1 << 5;
        const DRIVE_FAULT                 = 1 << 6;
        const OVER_VOLTAGE                = 1 << 7;
        const UNDER_VOLTAGE               = 1 << 8;
        const AMPLIFIER_OVER_TEMPERATURE  = 1 << 9;
        /// Advisory.
        const INTERNAL_LIMIT              = 1 << 10;
        /// **LATCHED**.
        const FEEDBACK_ERROR              = 1 << 11;
        const MOTOR_PHASING_ERROR         = 1 << 12;
        /// **LATCHED**.
        const DATA_FLASH_CRC_FAILURE      = 1 << 13;
        /// **LATCHED**.
        const AMPLIFIER_INTERNAL_ERROR    = 1 << 14;
        /// **LATCHED**.
        const FPGA_FAILURE                = 1 << 15;
        /// **LATCHED**.
        const SHORT_CIRCUIT               = 1 << 16;
        /// Advisory.
        const MOTION_TIMEOUT              = 1 << 17;
        /// Advisory.
        const INVALID_COMMAND             = 1 << 18;
        /// Advisory.
        const VOLTAGE_OUTPUT_LIMITED      = 1 << 19;
        /// Advisory.
        const AT_VELOCITY_ACCEL_LIMIT     = 1 << 20;
        /// Advisory.
        const POSITION_COUNTS_WRAPPED     = 1 << 21;
    }
}

impl FaultFlags {
    /// Faults that only an external power cycle clears.
    pub const LATCHED_MASK: Self = Self::from_bits_truncate(
        Self::FEEDBACK_ERROR.bits()
            | Self::DATA_FLASH_CRC_FAILURE.bits()
            | Self::AMPLIFIER_INTERNAL_ERROR.bits()
            | Self::FPGA_FAILURE.bits()
            | Self::SHORT_CIRCUIT.bits(),
    );

    /// Faults that require restarting the controller process.
    pub const SYSTEM_MASK: Self = Self::ETHERCAT_NOT_READY;

    /// Faults reported to the operator without a state transition.
    pub const ADVISORY_MASK: Self = Self::from_bits_truncate(
        Self::INTERNAL_LIMIT.bits()
            | Self::MOTION_TIMEOUT.bits()
            | Self::INVALID_COMMAND.bits()
            | Self::VOLTAGE_OUTPUT_LIMITED.bits()
            | Self::AT_VELOCITY_ACCEL_LIMIT.bits()
            | Self::POSITION_COUNTS_WRAPPED.bits(),
    );

    /// Both limit-switch classes.
    pub const LIMIT_SWITCH_MASK: Self = Self::from_bits_truncate(
        Self::LIMIT_SWITCH_POSITIVE.bits() | Self::LIMIT_SWITCH_NEGATIVE.bits(),
    );

    /// Returns true if any fault that drives the controller to `Fault` is set.
    #[inline]
    pub const fn has_state_fault(&self) -> bool {
        self.intersects(Self::ADVISORY_MASK.complement())
    }

    /// Returns true if any latched fault is set.
    #[inline]
    pub const fn has_latched(&self) -> bool {
        self.intersects(Self::LATCHED_MASK)
    }
}

/// A single fault kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum FaultCode {
    SafetyInterlock = 0,
    LimitSwitchPositive = 1,
    LimitSwitchNegative = 2,
    FollowingError = 3,
    EthercatNotReady = 4,
    SimulinkFault = 5,
    DriveFault = 6,
    OverVoltage = 7,
    UnderVoltage = 8,
    AmplifierOverTemperature = 9,
    InternalLimit = 10,
    FeedbackError = 11,
    MotorPhasingError = 12,
    DataFlashCrcFailure = 13,
    AmplifierInternalError = 14,
    FpgaFailure = 15,
    ShortCircuit = 16,
    MotionTimeout = 17,
    InvalidCommand = 18,
    VoltageOutputLimited = 19,
    AtVelocityAccelerationLimit = 20,
    PositionCountsWrapped = 21,
}

impl FaultCode {
    pub const COUNT: usize = 22;

    /// All codes, in bit order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::SafetyInterlock,
        Self::LimitSwitchPositive,
        Self::LimitSwitchNegative,
        Self::FollowingError,
        Self::EthercatNotReady,
        Self::SimulinkFault,
        Self::DriveFault,
        Self::OverVoltage,
        Self::UnderVoltage,
        Self::AmplifierOverTemperature,
        Self::InternalLimit,
        Self::FeedbackError,
        Self::MotorPhasingError,
        Self::DataFlashCrcFailure,
        Self::AmplifierInternalError,
        Self::FpgaFailure,
        Self::ShortCircuit,
        Self::MotionTimeout,
        Self::InvalidCommand,
        Self::VoltageOutputLimited,
        Self::AtVelocityAccelerationLimit,
        Self::PositionCountsWrapped,
    ];

    /// The matching bit in [`FaultFlags`].
    #[inline]
    pub const fn flag(&self) -> FaultFlags {
        FaultFlags::from_bits_truncate(1 << (*self as u8))
    }

    pub const fn severity(&self) -> FaultSeverity {
        let flag = self.flag();
        if flag.intersects(FaultFlags::LATCHED_MASK) {
            FaultSeverity::Latched
        } else if flag.intersects(FaultFlags::SYSTEM_MASK) {
            FaultSeverity::System
        } else if flag.intersects(FaultFlags::ADVISORY_MASK) {
            FaultSeverity::Advisory
        } else {
            FaultSeverity::Recoverable
        }
    }

    /// Operator-facing name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SafetyInterlock => "Safety Interlock",
            Self::LimitSwitchPositive => "Limit Switch Positive",
            Self::LimitSwitchNegative => "Limit Switch Negative",
            Self::FollowingError => "Following Error",
            Self::EthercatNotReady => "Ethercat Not Ready",
            Self::SimulinkFault => "Simulink Fault",
            Self::DriveFault => "Drive Fault",
            Self::OverVoltage => "Over Voltage",
            Self::UnderVoltage => "Under Voltage",
            Self::AmplifierOverTemperature => "Amplifier Over Temperature",
            Self::InternalLimit => "Internal Limit",
            Self::FeedbackError => "Feedback Error",
            Self::MotorPhasingError => "Motor Phasing Error",
            Self::DataFlashCrcFailure => "Data Flash CRC Failure",
            Self::AmplifierInternalError => "Amplifier Internal Error",
            Self::FpgaFailure => "FPGA Failure",
            Self::ShortCircuit => "Short Circuit",
            Self::MotionTimeout => "Motion Timeout",
            Self::InvalidCommand => "Invalid Command",
            Self::VoltageOutputLimited => "Voltage Output Limited",
            Self::AtVelocityAccelerationLimit => "At Velocity/Acceleration Limit",
            Self::PositionCountsWrapped => "Position Counts Wrapped",
        }
    }

    /// Likely cause, as listed in the operator manual.
    pub const fn cause(&self) -> &'static str {
        match self {
            Self::SafetyInterlock => "safety interlock chain open (E-stop or interlock cable)",
            Self::LimitSwitchPositive => "a strut reached its extend limit switch",
            Self::LimitSwitchNegative => "a strut reached its retract limit switch",
            Self::FollowingError => "strut position deviates from the commanded position",
            Self::EthercatNotReady => "EtherCAT network not operational",
            Self::SimulinkFault => "controller model reported an internal fault",
            Self::DriveFault => "a drive reported a fault",
            Self::OverVoltage => "bus voltage above the drive limit",
            Self::UnderVoltage => "bus voltage below the drive limit",
            Self::AmplifierOverTemperature => "amplifier temperature too high",
            Self::InternalLimit => "drive internal limit active",
            Self::FeedbackError => "encoder feedback lost or invalid",
            Self::MotorPhasingError => "motor phasing failed or not initialized",
            Self::DataFlashCrcFailure => "drive flash memory corrupt",
            Self::AmplifierInternalError => "amplifier hardware failure",
            Self::FpgaFailure => "drive FPGA failure",
            Self::ShortCircuit => "short circuit on the motor output",
            Self::MotionTimeout => "move did not complete in time",
            Self::InvalidCommand => "controller rejected the last command",
            Self::VoltageOutputLimited => "drive output voltage saturated",
            Self::AtVelocityAccelerationLimit => "strut running at its velocity or acceleration limit",
            Self::PositionCountsWrapped => "position counter wrapped around",
        }
    }
}

/// Bitmask of affected struts (bit `i` = strut `i`).
pub type StrutMask = u8;

/// All struts set.
pub const ALL_STRUTS: StrutMask = (1 << NUM_STRUT) - 1;

/// One active fault with its detail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaultEntry {
    pub code: FaultCode,
    pub severity: FaultSeverity,
    /// Cannot be cleared by software.
    pub latched: bool,
    /// Struts reporting the fault; zero when the source is controller-wide.
    pub struts: StrutMask,
    pub cause: &'static str,
    /// Telemetry timestamp of the first frame reporting it [s].
    pub first_seen: f64,
}

impl FaultEntry {
    pub const fn new(code: FaultCode, struts: StrutMask, first_seen: f64) -> Self {
        let severity = code.severity();
        Self {
            code,
            severity,
            latched: matches!(severity, FaultSeverity::Latched),
            struts,
            cause: code.cause(),
            first_seen,
        }
    }
}

/// Union of the currently active faults.
///
/// Holds at most one entry per [`FaultCode`], ordered by code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaultSet {
    entries: heapless::Vec<FaultEntry, { FaultCode::COUNT }>,
}

impl FaultSet {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Insert or replace the entry for `entry.code`, keeping code order.
    pub fn upsert(&mut self, entry: FaultEntry) {
        match self
            .entries
            .binary_search_by_key(&(entry.code as u8), |e| e.code as u8)
        {
            Ok(idx) => self.entries[idx] = entry,
            Err(idx) => {
                // One slot per code; capacity can never be exceeded.
                let _ = self.entries.insert(idx, entry);
            }
        }
    }

    /// Drop the entry for `code`, returning it if present.
    pub fn remove(&mut self, code: FaultCode) -> Option<FaultEntry> {
        let idx = self.entries.iter().position(|e| e.code == code)?;
        Some(self.entries.remove(idx))
    }

    pub fn get(&self, code: FaultCode) -> Option<&FaultEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    #[inline]
    pub fn contains(&self, code: FaultCode) -> bool {
        self.get(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FaultEntry> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact view of the active codes.
    pub fn flags(&self) -> FaultFlags {
        self.entries
            .iter()
            .fold(FaultFlags::empty(), |acc, e| acc | e.code.flag())
    }

    /// Any latched, recoverable or system fault active.
    #[inline]
    pub fn has_state_fault(&self) -> bool {
        self.flags().has_state_fault()
    }

    /// Some active fault can only be cleared by a power cycle.
    #[inline]
    pub fn requires_power_cycle(&self) -> bool {
        self.flags().has_latched()
    }

    /// The controller process must be restarted.
    #[inline]
    pub fn requires_restart(&self) -> bool {
        self.flags().intersects(FaultFlags::SYSTEM_MASK)
    }
}
