//! Local command eligibility.
//!
//! Everything here is decided from the published view alone, before
//! anything is transmitted. A command that fails a check never reaches the
//! controller.

use bitflags::bitflags;
use hexgui_common::config::LimitsConfig;
use hexgui_common::consts::{
    MAX_ACCEL_LIMIT, MAX_ANGULAR_VEL_LIMIT, MAX_LINEAR_VEL_LIMIT, NUM_STRUT,
};
use hexgui_common::controller::{
    CommandKind, CommandRequest, ControllerState, EnabledSubstate, HexapodKind, LocalState, Pose,
    PoseLimits, StateTrigger, SubstateTrigger,
};

use crate::error::CommandError;
use crate::session::view::ControllerView;

bitflags! {
    /// Controller states in which a command may be issued.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllowedStates: u8 {
        const STANDBY    = 1 << 0;
        const STATIONARY = 1 << 1;
        const MOVING     = 1 << 2;
        const FAULT      = 1 << 3;

        const ENABLED = Self::STATIONARY.bits() | Self::MOVING.bits();
        const IDLE    = Self::STANDBY.bits() | Self::STATIONARY.bits();
        const ANY     = Self::STANDBY.bits() | Self::ENABLED.bits() | Self::FAULT.bits();
    }
}

impl AllowedStates {
    /// The single flag for `state`.
    pub const fn of(state: ControllerState) -> Self {
        match state {
            ControllerState::Standby => Self::STANDBY,
            ControllerState::Enabled(EnabledSubstate::Stationary) => Self::STATIONARY,
            ControllerState::Enabled(EnabledSubstate::MovingPointToPoint) => Self::MOVING,
            ControllerState::Fault => Self::FAULT,
        }
    }

    #[inline]
    pub const fn admits(&self, state: ControllerState) -> bool {
        self.contains(Self::of(state))
    }
}

/// States in which `kind` may be issued.
pub const fn allowed_states(kind: &CommandKind) -> AllowedStates {
    match kind {
        CommandKind::SetState(StateTrigger::Enable) => AllowedStates::STANDBY,
        CommandKind::SetState(StateTrigger::Standby) => {
            AllowedStates::ENABLED.union(AllowedStates::FAULT)
        }
        CommandKind::SetState(StateTrigger::ClearError) => AllowedStates::FAULT,
        CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Move,
            ..
        } => AllowedStates::STATIONARY,
        CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Stop,
            ..
        } => AllowedStates::ENABLED,
        CommandKind::SetPosition(_)
        | CommandKind::SetPositionOffset(_)
        | CommandKind::SetRawPosition { .. } => AllowedStates::STATIONARY,
        CommandKind::SwitchCommandSource(_) => AllowedStates::ANY,
        CommandKind::MaskLimitSwitch(_) => AllowedStates::IDLE.union(AllowedStates::FAULT),
        CommandKind::SetPivot { .. }
        | CommandKind::EnableDrives(_)
        | CommandKind::ConfigAcceleration(_)
        | CommandKind::ConfigVelocity { .. } => AllowedStates::IDLE,
    }
}

/// Inputs of one eligibility check.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub view: &'a ControllerView,
    pub limits: &'a LimitsConfig,
    pub hexapod: HexapodKind,
    /// A move target was set by the previous transmitted command.
    pub target_pending: bool,
}

impl ValidationContext<'_> {
    /// Pose limits published by the controller, else the hexapod's defaults.
    fn pose_limits(&self) -> PoseLimits {
        self.view
            .config
            .as_ref()
            .map_or_else(|| self.hexapod.pose_limits(), |c| c.pose_limits)
    }

    fn strut_travel(&self) -> f64 {
        self.view
            .config
            .as_ref()
            .map_or(self.limits.strut_travel, |c| c.max_displacement_strut)
    }
}

/// Check `request` against the current view.
///
/// # Errors
///
/// The first failed check, in order: link and state known, authority,
/// state precondition, parameter range.
pub fn validate(request: &CommandRequest, ctx: &ValidationContext<'_>) -> Result<(), CommandError> {
    let state = match ctx.view.local {
        LocalState::Disconnected => return Err(CommandError::Disconnected),
        LocalState::AwaitingTelemetry => return Err(CommandError::StateUnknown),
        LocalState::Known(state) => state,
    };

    let kind = &request.kind;
    if !matches!(kind, CommandKind::SwitchCommandSource(_)) {
        if let Some(commander) = ctx.view.commander {
            if commander != request.source {
                return Err(CommandError::NotCommander);
            }
        }
    }

    if !allowed_states(kind).admits(state) {
        return Err(CommandError::invalid(format!(
            "{} is not allowed in {}",
            kind.name(),
            state.name()
        )));
    }

    check_parameters(kind, ctx)
}

fn check_parameters(kind: &CommandKind, ctx: &ValidationContext<'_>) -> Result<(), CommandError> {
    match kind {
        CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Move,
            ..
        } if !ctx.target_pending => Err(CommandError::invalid(
            "no move target set, send a position first",
        )),
        CommandKind::SetPivot { x, y, z } => {
            symmetric("pivot x", *x, ctx.limits.pivot_x)?;
            symmetric("pivot y", *y, ctx.limits.pivot_y)?;
            symmetric("pivot z", *z, ctx.limits.pivot_z)
        }
        CommandKind::SetPosition(pose) => check_pose(pose, &ctx.pose_limits()),
        CommandKind::SetPositionOffset(offset) => {
            let current = ctx.view.pose().unwrap_or_default();
            check_pose(&current.offset_by(offset), &ctx.pose_limits())
        }
        CommandKind::SetRawPosition { struts } => {
            let travel = ctx.strut_travel();
            for (name, value) in STRUT_FIELDS.iter().zip(struts) {
                symmetric(*name, *value, travel)?;
            }
            Ok(())
        }
        CommandKind::ConfigAcceleration(accel) => {
            positive("acceleration", *accel, MAX_ACCEL_LIMIT)
        }
        CommandKind::ConfigVelocity { xy, uv, z, w } => {
            positive("velocity xy", *xy, MAX_LINEAR_VEL_LIMIT)?;
            positive("velocity uv", *uv, MAX_ANGULAR_VEL_LIMIT)?;
            positive("velocity z", *z, MAX_LINEAR_VEL_LIMIT)?;
            positive("velocity w", *w, MAX_ANGULAR_VEL_LIMIT)
        }
        _ => Ok(()),
    }
}

const STRUT_FIELDS: [&str; NUM_STRUT] = [
    "strut 1", "strut 2", "strut 3", "strut 4", "strut 5", "strut 6",
];

/// `|value| <= range`; NaN fails.
fn symmetric(field: &'static str, value: f64, range: f64) -> Result<(), CommandError> {
    if value.abs() <= range {
        Ok(())
    } else {
        Err(CommandError::OutOfRange {
            field,
            value,
            min: -range,
            max: range,
        })
    }
}

/// `0 < value <= max`; NaN fails.
fn positive(field: &'static str, value: f64, max: f64) -> Result<(), CommandError> {
    if value > 0.0 && value <= max {
        Ok(())
    } else {
        Err(CommandError::OutOfRange {
            field,
            value,
            min: 0.0,
            max,
        })
    }
}

fn check_pose(pose: &Pose, limits: &PoseLimits) -> Result<(), CommandError> {
    let fields = [
        ("x", pose.x, -limits.xy_max, limits.xy_max),
        ("y", pose.y, -limits.xy_max, limits.xy_max),
        ("z", pose.z, limits.z_min, limits.z_max),
        ("rx", pose.rx, -limits.rxry_max, limits.rxry_max),
        ("ry", pose.ry, -limits.rxry_max, limits.rxry_max),
        ("rz", pose.rz, limits.rz_min, limits.rz_max),
    ];
    match fields
        .into_iter()
        .find(|(_, value, min, max)| !(*min..=*max).contains(value))
    {
        Some((field, value, min, max)) => Err(CommandError::OutOfRange {
            field,
            value,
            min,
            max,
        }),
        None => Ok(()),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
