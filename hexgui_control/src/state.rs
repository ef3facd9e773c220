//! Controller state tracking.
//!
//! The tracked state is derived from telemetry only; commands never move it.

pub mod tracker;

pub use tracker::{transition, StateTracker, Transition};
