//! Prelude module for common re-exports.
//!
//! ```rust
//! use hexgui_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, HexguiConfig, LogLevel, SettingsOverride, SharedConfig,
};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{NUM_DRIVE, NUM_STRUT};

// ─── Controller ─────────────────────────────────────────────────────
pub use crate::controller::{
    CommandCode, CommandKind, CommandRequest, CommandSource, ControllerConfig, ControllerState,
    EnabledSubstate, FaultCode, FaultEntry, FaultSet, FaultSeverity, HexapodKind, LimitDirection,
    LocalState, MotionPattern, Pose, ReportedState, StateTrigger, SubstateTrigger, TelemetryFrame,
    WireCommand,
};

// ─── Transport ──────────────────────────────────────────────────────
pub use crate::transport::{Connector, ControllerLink, TransportError};
pub use crate::wire::{ClientMessage, ControllerMessage};
