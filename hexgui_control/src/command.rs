//! Command validation, confirmation and dispatch.

pub mod confirm;
pub mod dispatcher;
pub mod validation;

pub use confirm::{AlwaysConfirm, Confirm, NeverConfirm};
pub use dispatcher::{CommandOutcome, Dispatcher, Effect};
pub use validation::{validate, AllowedStates, ValidationContext};
