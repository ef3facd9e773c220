//! Drive and application status registers.
//!
//! Bit layouts of the registers carried in every telemetry frame:
//! CiA-402 status word (0x6041), Copley latching fault status (0x2183),
//! Copley event status (0x2180), input pin states (0x219A) and the
//! controller's application status word.

use bitflags::bitflags;

use super::state::CommandSource;

bitflags! {
    /// Drive status word, object 0x6041 (one per strut).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusWord: u16 {
        const READY_TO_SWITCH_ON     = 1 << 0;
        const SWITCHED_ON            = 1 << 1;
        const OPERATION_ENABLED      = 1 << 2;
        const FAULT_LATCHED          = 1 << 3;
        const VOLTAGE_ENABLED        = 1 << 4;
        const QUICK_STOP             = 1 << 5;
        const SWITCH_ON_DISABLED     = 1 << 6;
        const WARNING                = 1 << 7;
        const TRAJECTORY_ABORTED     = 1 << 8;
        const REMOTE                 = 1 << 9;
        const TARGET_REACHED         = 1 << 10;
        const INTERNAL_LIMIT_ACTIVE  = 1 << 11;
        const SET_POINT_ACKNOWLEDGE  = 1 << 12;
        const FOLLOWING_ERROR        = 1 << 13;
        /// Amplifier move status.
        const IN_MOTION              = 1 << 14;
    }
}

impl StatusWord {
    #[inline]
    pub const fn is_in_motion(&self) -> bool {
        self.contains(Self::IN_MOTION)
    }

    #[inline]
    pub const fn is_drive_enabled(&self) -> bool {
        self.contains(Self::OPERATION_ENABLED)
    }
}

bitflags! {
    /// Latching fault status, object 0x2183 (one per strut).
    ///
    /// Bits stay set until the drive is reset; several only clear on a
    /// power cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LatchingFault: u16 {
        const DATA_FLASH_CRC         = 1 << 0;
        const AMPLIFIER_INTERNAL     = 1 << 1;
        const SHORT_CIRCUIT          = 1 << 2;
        const AMPLIFIER_OVER_TEMP    = 1 << 3;
        const MOTOR_OVER_TEMP        = 1 << 4;
        const OVER_VOLTAGE           = 1 << 5;
        const UNDER_VOLTAGE          = 1 << 6;
        const FEEDBACK               = 1 << 7;
        const PHASING                = 1 << 8;
        const TRACKING               = 1 << 9;
        const OVER_CURRENT           = 1 << 10;
        const FPGA_1                 = 1 << 11;
        const COMMAND_INPUT_LOST     = 1 << 12;
        const FPGA_2                 = 1 << 13;
        const SAFETY_CIRCUIT         = 1 << 14;
        const CURRENT_CONTROL_LOST   = 1 << 15;
    }
}

bitflags! {
    /// Copley drive event status, object 0x2180 (one per strut).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CopleyStatus: u32 {
        const SHORT_CIRCUIT          = 1 << 0;
        const AMPLIFIER_OVER_TEMP    = 1 << 1;
        const OVER_VOLTAGE           = 1 << 2;
        const UNDER_VOLTAGE          = 1 << 3;
        const MOTOR_OVER_TEMP        = 1 << 4;
        const FEEDBACK_ERROR         = 1 << 5;
        const PHASING_ERROR          = 1 << 6;
        const CURRENT_LIMITED        = 1 << 7;
        const VOLTAGE_LIMITED        = 1 << 8;
        const RETRACT_LIMIT_ACTIVE   = 1 << 9;
        const EXTEND_LIMIT_ACTIVE    = 1 << 10;
        const ENABLE_INPUT_INACTIVE  = 1 << 11;
        const SOFTWARE_DISABLED      = 1 << 12;
        const STOPPING               = 1 << 13;
        const BRAKE_ACTIVE           = 1 << 14;
        const PWM_DISABLED           = 1 << 15;
        const POSITIVE_SOFT_LIMIT    = 1 << 16;
        const NEGATIVE_SOFT_LIMIT    = 1 << 17;
        const TRACKING_ERROR         = 1 << 18;
        const TRACKING_WARNING       = 1 << 19;
        const IN_RESET               = 1 << 20;
        const POSITION_WRAPPED       = 1 << 21;
        const AMPLIFIER_FAULT        = 1 << 22;
        const AT_VELOCITY_LIMIT      = 1 << 23;
        const AT_ACCEL_LIMIT         = 1 << 24;
        const POSITION_WINDOW        = 1 << 25;
        const HOME_SWITCH            = 1 << 26;
        const IN_MOTION              = 1 << 27;
        const VELOCITY_WINDOW        = 1 << 28;
        const PHASING_NOT_SET        = 1 << 29;
        const COMMAND_FAULT          = 1 << 30;
    }
}

bitflags! {
    /// Controller application status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ApplicationStatus: u32 {
        const FOLLOWING_ERROR        = 0x0001;
        const MOVE_COMPLETE          = 0x0002;
        const EUI_CONNECTED          = 0x0004;
        const SAFETY_INTERLOCK       = 0x0008;
        const EXTEND_LIMIT_SWITCH    = 0x0010;
        const RETRACT_LIMIT_SWITCH   = 0x0020;
        const ETHERCAT_PROBLEM       = 0x0040;
        const SYNC_MODE              = 0x0080;
        /// Commands are taken from the automated system (CSC).
        const CSC_COMMAND_SOURCE     = 0x0400;
        const MOTION_TIMEOUT         = 0x0800;
        const INVALID_COMMAND        = 0x1000;
        const DRIVE_FAULT            = 0x2000;
        const SIMULINK_FAULT         = 0x4000;
    }
}

impl ApplicationStatus {
    /// Current commander as encoded in the status word.
    #[inline]
    pub const fn command_source(&self) -> CommandSource {
        if self.contains(Self::CSC_COMMAND_SOURCE) {
            CommandSource::Csc
        } else {
            CommandSource::Gui
        }
    }
}

/// Input pin register of one drive, object 0x219A.
///
/// Each drive serves two struts: the first strut on bits 5..=7, the second
/// on bits 15..=17. Per strut: interlock OK (active high), extend limit
/// switch and retract limit switch (both active low: the pin drops when
/// the switch is hit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputPins(pub u32);

/// Per-strut view decoded from [`InputPins`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrutPins {
    pub interlock_ok: bool,
    pub extend_limit_hit: bool,
    pub retract_limit_hit: bool,
}

impl InputPins {
    const FIRST_STRUT_OFFSET: u32 = 5;
    const SECOND_STRUT_OFFSET: u32 = 15;

    /// Register value with everything nominal for both struts.
    pub const NOMINAL: Self = Self((0b111 << Self::FIRST_STRUT_OFFSET) | (0b111 << Self::SECOND_STRUT_OFFSET));

    /// Decode the pins of strut `slot` (0 or 1) on this drive.
    pub const fn strut(&self, slot: usize) -> StrutPins {
        let offset = if slot == 0 {
            Self::FIRST_STRUT_OFFSET
        } else {
            Self::SECOND_STRUT_OFFSET
        };
        let bits = self.0 >> offset;
        StrutPins {
            interlock_ok: bits & 0b001 != 0,
            extend_limit_hit: bits & 0b010 == 0,
            retract_limit_hit: bits & 0b100 == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_word_motion_bit() {
        let word = StatusWord::from_bits_truncate(0x631);
        assert!(!word.is_in_motion());
        assert!(StatusWord::from_bits_truncate(0x631 | 0x4000).is_in_motion());
    }

    #[test]
    fn status_word_drive_enabled() {
        // Drives off / on as reported by a healthy controller.
        assert!(!StatusWord::from_bits_truncate(0x670).is_drive_enabled());
        assert!(StatusWord::from_bits_truncate(0x637).is_drive_enabled());
    }

    #[test]
    fn application_status_command_source() {
        let status = ApplicationStatus::EUI_CONNECTED | ApplicationStatus::SYNC_MODE;
        assert_eq!(status.command_source(), CommandSource::Gui);
        let status = status | ApplicationStatus::CSC_COMMAND_SOURCE;
        assert_eq!(status.command_source(), CommandSource::Csc);
    }

    #[test]
    fn input_pins_nominal() {
        let pins = InputPins::NOMINAL;
        for slot in 0..2 {
            let s = pins.strut(slot);
            assert!(s.interlock_ok);
            assert!(!s.extend_limit_hit);
            assert!(!s.retract_limit_hit);
        }
    }

    #[test]
    fn input_pins_limit_hit_is_active_low() {
        // Second strut: extend switch pin dropped.
        let pins = InputPins(InputPins::NOMINAL.0 & !(0b010 << 15));
        assert!(!pins.strut(0).extend_limit_hit);
        assert!(pins.strut(1).extend_limit_hit);
        assert!(!pins.strut(1).retract_limit_hit);
    }

    #[test]
    fn input_pins_interlock_open() {
        let pins = InputPins(0);
        let s = pins.strut(0);
        assert!(!s.interlock_ok);
        assert!(s.extend_limit_hit);
        assert!(s.retract_limit_hit);
    }
}
