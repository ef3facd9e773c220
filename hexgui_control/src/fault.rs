//! Fault aggregation.
//!
//! Raw status registers → fault taxonomy, plus the operator's limit-switch
//! mask used to drive a strut off a switch.

pub mod aggregator;
pub mod limit_mask;

pub use aggregator::{observe, FaultAggregator, Observation};
pub use limit_mask::{LimitMask, MaskUpdate};
