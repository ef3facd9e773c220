//! Telemetry ingest.
//!
//! Frame validation and the per-frame update pipeline, plus inter-arrival
//! statistics.

pub mod ingest;
pub mod rate;

pub use ingest::{Ingest, IngestOutcome};
pub use rate::{RateMonitor, RateStats};
