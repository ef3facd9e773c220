//! # Hexapod controller simulator
//!
//! A mock hexapod controller for running the engineering client without
//! hardware.
//!
//! - [`controller`] - the simulated controller: state machine, motion, fault injection
//! - [`motion`] - per-cycle motion model
//! - [`connector`] - in-process [`Connector`](hexgui_common::transport::Connector)
//! - [`server`] - TCP mock server speaking the controller wire protocol

pub mod connector;
pub mod controller;
pub mod motion;
pub mod server;

pub use crate::connector::{SharedController, SimulationConnector};
pub use crate::controller::{Injection, MockController};
