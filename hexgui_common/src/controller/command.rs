//! Command requests and their wire encoding.
//!
//! A [`CommandRequest`] is what the operator (or a test) asks for; a
//! [`WireCommand`] is what the controller receives: a command code plus six
//! `f64` parameters, tagged with a per-session counter used to match the
//! acknowledgement.

use serde::{Deserialize, Serialize};

use super::state::{CommandSource, MotionPattern, Pose};
use crate::consts::NUM_STRUT;

/// Controller command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CommandCode {
    EnableDrives = 0x7000,
    SetState = 0x8000,
    SetEnabledSubstate = 0x8001,
    PositionSet = 0x8004,
    SetPivotPoint = 0x8007,
    SetRawStrut = 0x8008,
    CmdSource = 0x8009,
    MaskLimitSwitch = 0x800A,
    ConfigAccel = 0x800B,
    ConfigVel = 0x800C,
    PositionOffset = 0x8010,
}

impl CommandCode {
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x7000 => Some(Self::EnableDrives),
            0x8000 => Some(Self::SetState),
            0x8001 => Some(Self::SetEnabledSubstate),
            0x8004 => Some(Self::PositionSet),
            0x8007 => Some(Self::SetPivotPoint),
            0x8008 => Some(Self::SetRawStrut),
            0x8009 => Some(Self::CmdSource),
            0x800A => Some(Self::MaskLimitSwitch),
            0x800B => Some(Self::ConfigAccel),
            0x800C => Some(Self::ConfigVel),
            0x8010 => Some(Self::PositionOffset),
            _ => None,
        }
    }
}

/// Target of a state-change command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateTrigger {
    Enable,
    Standby,
    ClearError,
}

impl StateTrigger {
    /// Controller parameter value.
    pub const fn param(&self) -> f64 {
        match self {
            Self::Enable => 2.0,
            Self::Standby => 3.0,
            Self::ClearError => 6.0,
        }
    }

    fn from_param(value: f64) -> Option<Self> {
        [Self::Enable, Self::Standby, Self::ClearError]
            .into_iter()
            .find(|t| t.param() == value)
    }
}

/// Target of an enabled-substate command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubstateTrigger {
    Move,
    Stop,
}

impl SubstateTrigger {
    pub const fn param(&self) -> f64 {
        match self {
            Self::Move => 1.0,
            Self::Stop => 3.0,
        }
    }
}

/// Limit-switch class to mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LimitDirection {
    Retract = 0,
    Extend = 1,
}

/// A discrete command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    SetState(StateTrigger),
    SetEnabledSubstate {
        trigger: SubstateTrigger,
        pattern: MotionPattern,
    },
    /// Absolute hexapod target [µm, deg].
    SetPosition(Pose),
    /// Target relative to the current pose.
    SetPositionOffset(Pose),
    /// Per-strut target [µm], bypassing the pose kinematics.
    SetRawPosition { struts: [f64; NUM_STRUT] },
    /// Center of rotation [µm].
    SetPivot { x: f64, y: f64, z: f64 },
    SwitchCommandSource(CommandSource),
    MaskLimitSwitch(LimitDirection),
    EnableDrives(bool),
    /// Strut acceleration [µm/s²].
    ConfigAcceleration(f64),
    /// Velocity limits: linear [µm/s] (`xy`, `z`), angular [deg/s] (`uv`, `w`).
    ConfigVelocity { xy: f64, uv: f64, z: f64, w: f64 },
}

impl CommandKind {
    pub const fn code(&self) -> CommandCode {
        match self {
            Self::SetState(_) => CommandCode::SetState,
            Self::SetEnabledSubstate { .. } => CommandCode::SetEnabledSubstate,
            Self::SetPosition(_) => CommandCode::PositionSet,
            Self::SetPositionOffset(_) => CommandCode::PositionOffset,
            Self::SetRawPosition { .. } => CommandCode::SetRawStrut,
            Self::SetPivot { .. } => CommandCode::SetPivotPoint,
            Self::SwitchCommandSource(_) => CommandCode::CmdSource,
            Self::MaskLimitSwitch(_) => CommandCode::MaskLimitSwitch,
            Self::EnableDrives(_) => CommandCode::EnableDrives,
            Self::ConfigAcceleration(_) => CommandCode::ConfigAccel,
            Self::ConfigVelocity { .. } => CommandCode::ConfigVel,
        }
    }

    /// Short name for logs and console output.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetState(StateTrigger::Enable) => "enable",
            Self::SetState(StateTrigger::Standby) => "standby",
            Self::SetState(StateTrigger::ClearError) => "clear-error",
            Self::SetEnabledSubstate {
                trigger: SubstateTrigger::Move,
                ..
            } => "move",
            Self::SetEnabledSubstate {
                trigger: SubstateTrigger::Stop,
                ..
            } => "stop",
            Self::SetPosition(_) => "set-position",
            Self::SetPositionOffset(_) => "set-position-offset",
            Self::SetRawPosition { .. } => "set-raw-position",
            Self::SetPivot { .. } => "set-pivot",
            Self::SwitchCommandSource(_) => "switch-command-source",
            Self::MaskLimitSwitch(_) => "mask-limit-switch",
            Self::EnableDrives(_) => "enable-drives",
            Self::ConfigAcceleration(_) => "config-acceleration",
            Self::ConfigVelocity { .. } => "config-velocity",
        }
    }

    /// Whether the command moves the hexapod.
    pub const fn is_motion(&self) -> bool {
        matches!(
            self,
            Self::SetEnabledSubstate {
                trigger: SubstateTrigger::Move,
                ..
            }
        )
    }

    /// Whether the command stores a move target on the controller.
    pub const fn sets_target(&self) -> bool {
        matches!(
            self,
            Self::SetPosition(_) | Self::SetPositionOffset(_) | Self::SetRawPosition { .. }
        )
    }

    /// Whether the operator must confirm before transmission.
    ///
    /// `commander` is the source currently holding authority.
    pub fn is_dangerous(&self, commander: CommandSource) -> bool {
        match self {
            Self::SetRawPosition { .. } | Self::SetPivot { .. } => true,
            Self::SetEnabledSubstate {
                trigger: SubstateTrigger::Move,
                pattern: MotionPattern::Async,
            } => true,
            Self::SwitchCommandSource(CommandSource::Gui) => commander == CommandSource::Csc,
            _ => false,
        }
    }

    /// Controller parameters.
    pub fn params(&self) -> [f64; 6] {
        let mut p = [0.0; 6];
        match self {
            Self::SetState(trigger) => p[0] = trigger.param(),
            Self::SetEnabledSubstate { trigger, pattern } => {
                p[0] = trigger.param();
                if matches!(trigger, SubstateTrigger::Move) {
                    p[1] = f64::from(*pattern as u8);
                }
            }
            Self::SetPosition(pose) | Self::SetPositionOffset(pose) => p = pose.to_array(),
            Self::SetRawPosition { struts } => p = *struts,
            Self::SetPivot { x, y, z } => {
                p[0] = *x;
                p[1] = *y;
                p[2] = *z;
            }
            Self::SwitchCommandSource(source) => p[0] = f64::from(*source as u8),
            Self::MaskLimitSwitch(direction) => p[0] = f64::from(*direction as u8),
            Self::EnableDrives(on) => p[0] = if *on { 1.0 } else { 0.0 },
            Self::ConfigAcceleration(accel) => p[0] = *accel,
            Self::ConfigVelocity { xy, uv, z, w } => {
                p[0] = *xy;
                p[1] = *uv;
                p[2] = *z;
                p[3] = *w;
            }
        }
        p
    }

    /// Encode with the session counter.
    pub fn to_wire(&self, counter: u32) -> WireCommand {
        WireCommand {
            counter,
            code: self.code() as u16,
            params: self.params(),
        }
    }

    /// Decode a received wire command. `None` for unknown codes or
    /// parameters outside the enumerations.
    pub fn from_wire(wire: &WireCommand) -> Option<Self> {
        let p = &wire.params;
        let kind = match CommandCode::from_u16(wire.code)? {
            CommandCode::SetState => Self::SetState(StateTrigger::from_param(p[0])?),
            CommandCode::SetEnabledSubstate => {
                let trigger = if p[0] == SubstateTrigger::Move.param() {
                    SubstateTrigger::Move
                } else if p[0] == SubstateTrigger::Stop.param() {
                    SubstateTrigger::Stop
                } else {
                    return None;
                };
                let pattern = match p[1] as u8 {
                    0 => MotionPattern::Sync,
                    1 => MotionPattern::Async,
                    _ => return None,
                };
                Self::SetEnabledSubstate { trigger, pattern }
            }
            CommandCode::PositionSet => Self::SetPosition(Pose::from_array(*p)),
            CommandCode::PositionOffset => Self::SetPositionOffset(Pose::from_array(*p)),
            CommandCode::SetRawStrut => Self::SetRawPosition { struts: *p },
            CommandCode::SetPivotPoint => Self::SetPivot {
                x: p[0],
                y: p[1],
                z: p[2],
            },
            CommandCode::CmdSource => Self::SwitchCommandSource(CommandSource::from_u8(p[0] as u8)?),
            CommandCode::MaskLimitSwitch => Self::MaskLimitSwitch(match p[0] as u8 {
                0 => LimitDirection::Retract,
                1 => LimitDirection::Extend,
                _ => return None,
            }),
            CommandCode::EnableDrives => Self::EnableDrives(p[0] != 0.0),
            CommandCode::ConfigAccel => Self::ConfigAcceleration(p[0]),
            CommandCode::ConfigVel => Self::ConfigVelocity {
                xy: p[0],
                uv: p[1],
                z: p[2],
                w: p[3],
            },
        };
        Some(kind)
    }
}

/// A command issued by a given actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub source: CommandSource,
}

impl CommandRequest {
    pub const fn new(kind: CommandKind, source: CommandSource) -> Self {
        Self { kind, source }
    }

    /// Request issued from this front end.
    pub const fn gui(kind: CommandKind) -> Self {
        Self::new(kind, CommandSource::Gui)
    }
}

/// Encoded command as sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    /// Per-session sequence number, echoed in the acknowledgement.
    pub counter: u32,
    pub code: u16,
    pub params: [f64; 6],
}
