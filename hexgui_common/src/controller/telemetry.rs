//! Telemetry frame and controller configuration.
//!
//! [`TelemetryFrame`] mirrors the controller's periodic telemetry as it is
//! sent on the wire: state bytes stay raw and are checked by
//! [`TelemetryFrame::decode`], which yields the validated [`ReportedFrame`]
//! the state tracker works on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{CommandSource, EnabledSubstate, Pose, PoseLimits, ReportedState};
use super::status::{ApplicationStatus, CopleyStatus, InputPins, LatchingFault, StatusWord, StrutPins};
use crate::consts::{NUM_DRIVE, NUM_STRUT};

/// Periodic telemetry as published by the controller (nominally 20 Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Controller TAI timestamp [s].
    pub timestamp: f64,
    /// Raw [`ReportedState`] byte.
    pub state: u8,
    /// Raw [`EnabledSubstate`] byte.
    pub enabled_substate: u8,
    /// Raw [`ApplicationStatus`] word.
    pub application_status: u32,

    /// Measured strut positions [µm].
    pub strut_position: [f64; NUM_STRUT],
    /// Strut following errors [µm].
    pub strut_position_error: [f64; NUM_STRUT],
    /// Commanded final strut positions [µm].
    pub strut_commanded_position: [f64; NUM_STRUT],
    /// Commanded strut accelerations [µm/s²].
    pub strut_commanded_accel: [f64; NUM_STRUT],
    /// Motor currents [A].
    pub motor_current: [f64; NUM_STRUT],
    /// Drive bus voltages [V].
    pub bus_voltage: [f64; NUM_DRIVE],

    /// Measured hexapod pose.
    pub pose: Pose,
    /// Commanded hexapod pose.
    pub commanded_pose: Pose,

    /// Status words, object 0x6041.
    pub status_word: [u16; NUM_STRUT],
    /// Latching fault registers, object 0x2183.
    pub latching_fault: [u16; NUM_STRUT],
    /// Copley status registers, object 0x2180.
    pub copley_status: [u32; NUM_STRUT],
    /// Input pin registers, object 0x219A.
    pub input_pins: [u32; NUM_DRIVE],
}

impl Default for TelemetryFrame {
    /// A healthy Standby frame: drives off, interlock closed, no switch hit.
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            state: ReportedState::Standby as u8,
            enabled_substate: EnabledSubstate::Stationary as u8,
            application_status: (ApplicationStatus::EUI_CONNECTED | ApplicationStatus::SYNC_MODE)
                .bits(),
            strut_position: [0.0; NUM_STRUT],
            strut_position_error: [0.0; NUM_STRUT],
            strut_commanded_position: [0.0; NUM_STRUT],
            strut_commanded_accel: [0.0; NUM_STRUT],
            motor_current: [0.0; NUM_STRUT],
            bus_voltage: [0.0; NUM_DRIVE],
            pose: Pose::default(),
            commanded_pose: Pose::default(),
            status_word: [0x670; NUM_STRUT],
            latching_fault: [0; NUM_STRUT],
            copley_status: [0; NUM_STRUT],
            input_pins: [InputPins::NOMINAL.0; NUM_DRIVE],
        }
    }
}

/// Telemetry that does not match the expected shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("unknown controller state {0}")]
    UnknownState(u8),

    #[error("unknown enabled substate {0}")]
    UnknownSubstate(u8),

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Validated per-frame summary used by the state tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedFrame {
    pub timestamp: f64,
    pub state: ReportedState,
    pub substate: EnabledSubstate,
    pub in_motion: [bool; NUM_STRUT],
    pub commander: CommandSource,
}

impl ReportedFrame {
    #[inline]
    pub fn any_in_motion(&self) -> bool {
        self.in_motion.iter().any(|m| *m)
    }
}

impl TelemetryFrame {
    /// Check the frame and extract the summary.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if a state byte is outside its enumeration or
    /// a measurement is NaN or infinite.
    pub fn decode(&self) -> Result<ReportedFrame, FrameError> {
        let state = ReportedState::from_u8(self.state).ok_or(FrameError::UnknownState(self.state))?;
        let substate = EnabledSubstate::from_u8(self.enabled_substate)
            .ok_or(FrameError::UnknownSubstate(self.enabled_substate))?;
        if let Some(field) = self.first_non_finite() {
            return Err(FrameError::NonFinite(field));
        }

        Ok(ReportedFrame {
            timestamp: self.timestamp,
            state,
            substate,
            in_motion: self.in_motion(),
            commander: self.command_source(),
        })
    }

    fn first_non_finite(&self) -> Option<&'static str> {
        let finite = |values: &[f64]| values.iter().all(|v| v.is_finite());
        if !self.timestamp.is_finite() {
            Some("timestamp")
        } else if !finite(&self.strut_position) {
            Some("strut_position")
        } else if !finite(&self.strut_position_error) {
            Some("strut_position_error")
        } else if !finite(&self.strut_commanded_position) {
            Some("strut_commanded_position")
        } else if !finite(&self.strut_commanded_accel) {
            Some("strut_commanded_accel")
        } else if !finite(&self.motor_current) {
            Some("motor_current")
        } else if !finite(&self.bus_voltage) {
            Some("bus_voltage")
        } else if !finite(&self.pose.to_array()) {
            Some("pose")
        } else if !finite(&self.commanded_pose.to_array()) {
            Some("commanded_pose")
        } else {
            None
        }
    }

    #[inline]
    pub const fn app_status(&self) -> ApplicationStatus {
        ApplicationStatus::from_bits_truncate(self.application_status)
    }

    /// Commander encoded in the application status (bit 0x400).
    #[inline]
    pub const fn command_source(&self) -> CommandSource {
        self.app_status().command_source()
    }

    #[inline]
    pub const fn status_word_of(&self, strut: usize) -> StatusWord {
        StatusWord::from_bits_truncate(self.status_word[strut])
    }

    #[inline]
    pub const fn latching_fault_of(&self, strut: usize) -> LatchingFault {
        LatchingFault::from_bits_truncate(self.latching_fault[strut])
    }

    #[inline]
    pub const fn copley_status_of(&self, strut: usize) -> CopleyStatus {
        CopleyStatus::from_bits_truncate(self.copley_status[strut])
    }

    /// Input pins of a strut; strut `i` sits on drive `i / 2`.
    #[inline]
    pub const fn pins_of(&self, strut: usize) -> StrutPins {
        InputPins(self.input_pins[strut / 2]).strut(strut % 2)
    }

    /// Per-strut in-motion flags (status word bit 14).
    pub fn in_motion(&self) -> [bool; NUM_STRUT] {
        std::array::from_fn(|i| self.status_word_of(i).is_in_motion())
    }

    /// Per-strut drive-enabled flags (status word bit 2).
    pub fn drives_enabled(&self) -> [bool; NUM_STRUT] {
        std::array::from_fn(|i| self.status_word_of(i).is_drive_enabled())
    }

    /// Total motor power [W]: each strut current times its drive bus voltage.
    pub fn total_power(&self) -> f64 {
        (0..NUM_STRUT)
            .map(|i| self.motor_current[i] * self.bus_voltage[i / 2])
            .sum()
    }
}

/// Controller configuration, published on connect and after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Strut acceleration limit [µm/s²].
    pub acceleration_strut: f64,
    /// Linear velocity limit in x/y [µm/s].
    pub vel_xy: f64,
    /// Linear velocity limit in z [µm/s].
    pub vel_z: f64,
    /// Angular velocity limit about x/y [deg/s].
    pub vel_uv: f64,
    /// Angular velocity limit about z [deg/s].
    pub vel_w: f64,
    /// Maximum strut displacement [µm].
    pub max_displacement_strut: f64,
    /// Maximum strut velocity [µm/s].
    pub max_velocity_strut: f64,
    pub pose_limits: PoseLimits,
    /// Pivot x, y, z [µm].
    pub pivot: [f64; 3],
    pub drives_enabled: bool,
}
