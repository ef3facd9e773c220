//! Controller state enums.
//!
//! All enums use `#[repr(u8)]` to match the controller's raw telemetry
//! bytes. Raw values arrive in every frame and are decoded with `from_u8`;
//! an unknown value means the link is out of sync.

use serde::{Deserialize, Serialize};

use crate::consts::{
    CAM_UV_MAX_DEG, CAM_W_MAX_DEG, CAM_W_MIN_DEG, CAM_XY_MAX_MIC, CAM_Z_MAX_MIC, CAM_Z_MIN_MIC,
    M2_UV_MAX_DEG, M2_W_MAX_DEG, M2_W_MIN_DEG, M2_XY_MAX_MIC, M2_Z_MAX_MIC, M2_Z_MIN_MIC,
};

// ─── Reported state ─────────────────────────────────────────────────

/// Controller state as reported in the telemetry `state` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReportedState {
    Standby = 0,
    Enabled = 2,
    Fault = 3,
}

impl ReportedState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Standby),
            2 => Some(Self::Enabled),
            3 => Some(Self::Fault),
            _ => None,
        }
    }
}

/// Enabled substate (telemetry `enabled_substate` byte).
///
/// Meaningful only while the controller is `Enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EnabledSubstate {
    /// Enabled, not moving.
    #[default]
    Stationary = 0,
    /// Point-to-point move in progress.
    MovingPointToPoint = 1,
}

impl EnabledSubstate {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stationary),
            1 => Some(Self::MovingPointToPoint),
            _ => None,
        }
    }
}

// ─── Tracked state ──────────────────────────────────────────────────

/// Controller state as tracked locally.
///
/// The substate is carried by the `Enabled` variant, so it cannot exist
/// outside `Enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    Standby,
    Enabled(EnabledSubstate),
    Fault,
}

impl ControllerState {
    /// Entry state for `Enabled`; entering always asserts `Stationary`.
    pub const ENABLED_ENTRY: Self = Self::Enabled(EnabledSubstate::Stationary);

    #[inline]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// Enabled and not moving: the only state that accepts motion commands.
    #[inline]
    pub const fn is_stationary(&self) -> bool {
        matches!(self, Self::Enabled(EnabledSubstate::Stationary))
    }

    #[inline]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault)
    }

    /// Short operator-facing name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Standby => "Standby",
            Self::Enabled(EnabledSubstate::Stationary) => "Enabled/Stationary",
            Self::Enabled(EnabledSubstate::MovingPointToPoint) => "Enabled/MovingPt2Pt",
            Self::Fault => "Fault",
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::Standby
    }
}

/// Local view of the link plus controller state.
///
/// `Disconnected` and `AwaitingTelemetry` form the meta-state in which the
/// controller state is unknown; no prior state is carried across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LocalState {
    #[default]
    Disconnected,
    /// Link up, no frame received yet.
    AwaitingTelemetry,
    Known(ControllerState),
}

impl LocalState {
    /// The tracked controller state, if known.
    #[inline]
    pub const fn controller(&self) -> Option<ControllerState> {
        match self {
            Self::Known(s) => Some(*s),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

// ─── Authority ──────────────────────────────────────────────────────

/// Who is allowed to command the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum CommandSource {
    /// This manual front end.
    #[default]
    Gui = 0,
    /// The automated control system (CSC).
    Csc = 1,
}

impl CommandSource {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Gui),
            1 => Some(Self::Csc),
            _ => None,
        }
    }
}

/// Motion pattern of a move: struts synchronized or independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum MotionPattern {
    #[default]
    Sync = 0,
    Async = 1,
}

// ─── Hexapod selection ──────────────────────────────────────────────

/// Which hexapod the session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexapodKind {
    Camera = 1,
    M2 = 2,
}

impl HexapodKind {
    /// Parse the command-line index (`1` camera, `2` M2).
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Camera),
            2 => Some(Self::M2),
            _ => None,
        }
    }

    /// Position limits of this hexapod.
    pub const fn pose_limits(&self) -> PoseLimits {
        match self {
            Self::Camera => PoseLimits {
                xy_max: CAM_XY_MAX_MIC,
                z_min: CAM_Z_MIN_MIC,
                z_max: CAM_Z_MAX_MIC,
                rxry_max: CAM_UV_MAX_DEG,
                rz_min: CAM_W_MIN_DEG,
                rz_max: CAM_W_MAX_DEG,
            },
            Self::M2 => PoseLimits {
                xy_max: M2_XY_MAX_MIC,
                z_min: M2_Z_MIN_MIC,
                z_max: M2_Z_MAX_MIC,
                rxry_max: M2_UV_MAX_DEG,
                rz_min: M2_W_MIN_DEG,
                rz_max: M2_W_MAX_DEG,
            },
        }
    }
}

/// Hexapod pose: translation [µm] and rotation [deg].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Pose {
    pub const fn from_array(v: [f64; 6]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
            rx: v[3],
            ry: v[4],
            rz: v[5],
        }
    }

    pub const fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }

    /// Component-wise sum (pose + offset).
    pub fn offset_by(&self, offset: &Pose) -> Pose {
        Pose {
            x: self.x + offset.x,
            y: self.y + offset.y,
            z: self.z + offset.z,
            rx: self.rx + offset.rx,
            ry: self.ry + offset.ry,
            rz: self.rz + offset.rz,
        }
    }
}

/// Hexapod position limits. `xy` and `rxry` are symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseLimits {
    pub xy_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub rxry_max: f64,
    pub rz_min: f64,
    pub rz_max: f64,
}

impl PoseLimits {
    /// Name of the first axis out of range, or `None` when the pose fits.
    pub fn first_violation(&self, pose: &Pose) -> Option<&'static str> {
        if pose.x.abs() > self.xy_max {
            Some("x")
        } else if pose.y.abs() > self.xy_max {
            Some("y")
        } else if !(self.z_min..=self.z_max).contains(&pose.z) {
            Some("z")
        } else if pose.rx.abs() > self.rxry_max {
            Some("rx")
        } else if pose.ry.abs() > self.rxry_max {
            Some("ry")
        } else if !(self.rz_min..=self.rz_max).contains(&pose.rz) {
            Some("rz")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_state_roundtrip() {
        for s in [ReportedState::Standby, ReportedState::Enabled, ReportedState::Fault] {
            assert_eq!(ReportedState::from_u8(s as u8), Some(s));
        }
        assert_eq!(ReportedState::from_u8(1), None);
        assert_eq!(ReportedState::from_u8(200), None);
    }

    #[test]
    fn substate_roundtrip() {
        assert_eq!(EnabledSubstate::from_u8(0), Some(EnabledSubstate::Stationary));
        assert_eq!(
            EnabledSubstate::from_u8(1),
            Some(EnabledSubstate::MovingPointToPoint)
        );
        assert_eq!(EnabledSubstate::from_u8(2), None);
    }

    #[test]
    fn only_stationary_accepts_motion() {
        assert!(ControllerState::ENABLED_ENTRY.is_stationary());
        assert!(!ControllerState::Standby.is_stationary());
        assert!(!ControllerState::Fault.is_stationary());
        assert!(!ControllerState::Enabled(EnabledSubstate::MovingPointToPoint).is_stationary());
    }

    #[test]
    fn local_state_controller_only_when_known() {
        assert_eq!(LocalState::Disconnected.controller(), None);
        assert_eq!(LocalState::AwaitingTelemetry.controller(), None);
        assert!(LocalState::AwaitingTelemetry.is_connected());
        assert!(!LocalState::Disconnected.is_connected());
        assert_eq!(
            LocalState::Known(ControllerState::Fault).controller(),
            Some(ControllerState::Fault)
        );
    }

    #[test]
    fn hexapod_index() {
        assert_eq!(HexapodKind::from_index(1), Some(HexapodKind::Camera));
        assert_eq!(HexapodKind::from_index(2), Some(HexapodKind::M2));
        assert_eq!(HexapodKind::from_index(3), None);
    }

    #[test]
    fn pose_limit_violations() {
        let limits = HexapodKind::M2.pose_limits();
        assert_eq!(limits.first_violation(&Pose::default()), None);

        let pose = Pose {
            z: 9000.0,
            ..Default::default()
        };
        assert_eq!(limits.first_violation(&pose), Some("z"));

        let pose = Pose {
            rz: -0.06,
            ..Default::default()
        };
        assert_eq!(limits.first_violation(&pose), Some("rz"));

        // Same pose fits the camera hexapod.
        assert_eq!(HexapodKind::Camera.pose_limits().first_violation(&pose), None);
    }

    #[test]
    fn pose_offset() {
        let p = Pose::from_array([1.0, 2.0, 3.0, 0.5, 0.25, -0.5]);
        let q = p.offset_by(&Pose::from_array([1.0; 6]));
        assert_eq!(q.to_array(), [2.0, 3.0, 4.0, 1.5, 1.25, 0.5]);
    }
}
