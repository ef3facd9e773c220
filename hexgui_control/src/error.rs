//! Session and command error types.
//!
//! Command failures are returned to the operator for an explicit decision;
//! nothing is retried automatically.

use std::time::Duration;

use hexgui_common::transport::TransportError;
use thiserror::Error;

/// Why a submitted command did not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// No link, or the link dropped while the command was pending.
    #[error("not connected to the controller")]
    Disconnected,

    /// Link up but no telemetry received yet.
    #[error("controller state unknown, waiting for telemetry")]
    StateUnknown,

    /// Not allowed in the current state; nothing was sent.
    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// Parameter outside its allowed range; nothing was sent.
    #[error("{field} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The issuing actor does not hold command authority.
    #[error("command source is not the commander")]
    NotCommander,

    /// The operator declined the confirmation.
    #[error("cancelled by the operator")]
    Cancelled,

    #[error("rejected by the controller: {0}")]
    RejectedByController(String),

    /// No acknowledgement or confirming telemetry in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl CommandError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            reason: reason.into(),
        }
    }
}

/// Session-level failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The operator declined the disconnect warning.
    #[error("cancelled by the operator")]
    Cancelled,

    #[error("already connected")]
    AlreadyConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = CommandError::OutOfRange {
            field: "pivot z",
            value: 4e6,
            min: -3.5e6,
            max: 3.5e6,
        };
        assert!(e.to_string().starts_with("pivot z = 4000000"));
        assert_eq!(
            CommandError::invalid("not enabled").to_string(),
            "invalid command: not enabled"
        );
        let s: SessionError = TransportError::Closed.into();
        assert_eq!(s.to_string(), "connection closed by peer");
    }
}
