//! hexgui common library
//!
//! Shared constants, controller types, configuration and the wire codec for
//! the hexgui workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Hexapod geometry, motion limits and connection defaults
//! - [`controller`] - Controller state, status registers, faults, telemetry, commands
//! - [`config`] - Configuration loading traits and types
//! - [`wire`] - Length-prefixed bincode framing
//! - [`transport`] - `Connector` trait and transport errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use hexgui_common::prelude::*;
//!
//! let request = CommandRequest::gui(CommandKind::SetState(StateTrigger::Enable));
//! assert_eq!(request.kind.code(), CommandCode::SetState);
//! ```

pub mod config;
pub mod consts;
pub mod controller;
pub mod prelude;
pub mod transport;
pub mod wire;
