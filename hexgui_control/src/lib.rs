//! # Hexapod Controller Session
//!
//! Manual-control session core for the camera and M2 hexapods. Talks to the
//! embedded controller over a [`Connector`](hexgui_common::transport::Connector)
//! (TCP or the in-process simulator) and keeps the operator's view of it.
//!
//! ## Data flow
//!
//! 1. **Telemetry**: every frame is validated, folded into the active fault
//!    set, filtered by the limit-switch mask and applied to the state tracker
//! 2. **View**: the session I/O task publishes one [`ControllerView`]
//!    snapshot per change through a `watch` channel
//! 3. **Commands**: checked against the latest snapshot, confirmed when
//!    dangerous, sent, then awaited until acknowledged and observed
//!
//! State never changes because a command was sent; only telemetry moves it.

pub mod command;
pub mod console;
pub mod error;
pub mod fault;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use command::{AlwaysConfirm, CommandOutcome, Confirm, NeverConfirm};
pub use error::{CommandError, SessionError};
pub use session::{ControllerView, Session};
pub use transport::TcpConnector;
