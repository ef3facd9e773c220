//! Command dispatcher.
//!
//! A submission is checked against the published view, confirmed if
//! dangerous, handed to the session I/O task, and then awaited twice within
//! one deadline: first the controller's acknowledgement, then (for commands
//! with an observable effect) the telemetry showing that effect. The caller
//! waits; ingest never does.

use std::sync::Arc;
use std::time::Duration;

use hexgui_common::config::{HexguiConfig, LimitsConfig};
use hexgui_common::consts::NUM_STRUT;
use hexgui_common::controller::{
    CommandKind, CommandRequest, CommandSource, ControllerState, HexapodKind, StateTrigger,
    SubstateTrigger,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::confirm::{prompt_for, Confirm};
use super::validation::{validate, ValidationContext};
use crate::error::CommandError;
use crate::session::io_loop::IoRequest;
use crate::session::view::ControllerView;

/// Largest strut following error of a finished move [µm].
const SETTLED_TOLERANCE_UM: f64 = 1.0;

/// Telemetry that confirms a command took effect.
///
/// A point-to-point move can start and finish between two frames, so
/// `Moving` is also reached by a Stationary frame whose commanded strut
/// positions changed since submission and have been reached. A move to the
/// position that was already commanded leaves no such trace and is only
/// observed while in motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Enabled,
    Standby,
    Moving {
        /// Commanded strut positions when the move was submitted [µm].
        from: Option<[f64; NUM_STRUT]>,
    },
    Stationary,
    Commander(CommandSource),
}

impl Effect {
    pub fn reached(&self, view: &ControllerView) -> bool {
        match self {
            Self::Enabled => view.state().is_some_and(|s| s.is_enabled()),
            Self::Standby => view.state() == Some(ControllerState::Standby),
            Self::Moving { from } => match view.state() {
                Some(s) if s.is_stationary() => {
                    from.as_ref().is_some_and(|from| move_finished(view, from))
                }
                Some(s) => s.is_enabled(),
                None => false,
            },
            Self::Stationary => view.state().is_some_and(|s| s.is_stationary()),
            Self::Commander(source) => view.commander == Some(*source),
        }
    }

    /// Bind a move effect to the commanded positions at submission.
    pub fn anchored(self, from: Option<[f64; NUM_STRUT]>) -> Self {
        match self {
            Self::Moving { .. } => Self::Moving { from },
            other => other,
        }
    }
}

fn move_finished(view: &ControllerView, from: &[f64; NUM_STRUT]) -> bool {
    let Some(frame) = view.telemetry.as_deref() else {
        return false;
    };
    frame.strut_commanded_position != *from
        && frame
            .strut_commanded_position
            .iter()
            .zip(&frame.strut_position)
            .all(|(cmd, pos)| (cmd - pos).abs() <= SETTLED_TOLERANCE_UM)
}

/// Effect awaited after the acknowledgement, if any.
pub const fn expected_effect(kind: &CommandKind) -> Option<Effect> {
    match kind {
        CommandKind::SetState(StateTrigger::Enable) => Some(Effect::Enabled),
        CommandKind::SetState(StateTrigger::Standby | StateTrigger::ClearError) => {
            Some(Effect::Standby)
        }
        CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Move,
            ..
        } => Some(Effect::Moving { from: None }),
        CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Stop,
            ..
        } => Some(Effect::Stationary),
        CommandKind::SwitchCommandSource(source) => Some(Effect::Commander(*source)),
        _ => None,
    }
}

/// A completed command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandOutcome {
    pub command: &'static str,
    /// Telemetry confirmed the effect (false for commands without one).
    pub observed: bool,
    pub elapsed: Duration,
}

/// Dispatcher bound to one connection.
pub struct Dispatcher {
    view: watch::Receiver<ControllerView>,
    requests: mpsc::Sender<IoRequest>,
    confirm: Arc<dyn Confirm>,
    limits: LimitsConfig,
    hexapod: HexapodKind,
    timeout: Duration,
    /// The last transmitted command set a move target.
    target_pending: Mutex<bool>,
}

impl Dispatcher {
    pub fn new(
        view: watch::Receiver<ControllerView>,
        requests: mpsc::Sender<IoRequest>,
        confirm: Arc<dyn Confirm>,
        config: &HexguiConfig,
        hexapod: HexapodKind,
    ) -> Self {
        Self {
            view,
            requests,
            confirm,
            limits: config.limits.clone(),
            hexapod,
            timeout: config.command.timeout(),
            target_pending: Mutex::new(false),
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn target_pending(&self) -> bool {
        *self.target_pending.lock()
    }

    /// Submit one command and wait for it to complete.
    ///
    /// # Errors
    ///
    /// Local rejections ([`CommandError::InvalidCommand`],
    /// [`CommandError::OutOfRange`], ...) are returned before anything is
    /// sent. After transmission: [`CommandError::RejectedByController`],
    /// [`CommandError::Timeout`] or [`CommandError::Disconnected`].
    pub async fn submit(&self, request: CommandRequest) -> Result<CommandOutcome, CommandError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let kind = request.kind;

        let (commander, commanded) = {
            let view = self.view.borrow();
            let ctx = ValidationContext {
                view: &view,
                limits: &self.limits,
                hexapod: self.hexapod,
                target_pending: self.target_pending(),
            };
            if let Err(e) = validate(&request, &ctx) {
                debug!(command = kind.name(), error = %e, "command refused locally");
                return Err(e);
            }
            (
                view.commander.unwrap_or_default(),
                view.telemetry.as_ref().map(|t| t.strut_commanded_position),
            )
        };

        if let Some(prompt) = prompt_for(&kind, commander) {
            if !self.confirm.confirm(&prompt) {
                info!(command = kind.name(), "command cancelled by operator");
                return Err(CommandError::Cancelled);
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(IoRequest {
                kind,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CommandError::Disconnected)?;
        // The controller keeps a target only until the next command.
        *self.target_pending.lock() = false;
        debug!(command = kind.name(), "command sent");

        match timeout_at(deadline, reply_rx).await {
            Err(_) => {
                warn!(command = kind.name(), timeout = ?self.timeout, "no acknowledgement");
                return Err(CommandError::Timeout(self.timeout));
            }
            Ok(Err(_)) => return Err(CommandError::Disconnected),
            Ok(Ok(Err(e))) => {
                warn!(command = kind.name(), error = %e, "command failed");
                return Err(e);
            }
            Ok(Ok(Ok(()))) => {}
        }
        if kind.sets_target() {
            *self.target_pending.lock() = true;
        }

        let observed = match expected_effect(&kind).map(|e| e.anchored(commanded)) {
            Some(effect) => {
                self.await_effect(effect, deadline).await?;
                true
            }
            None => false,
        };

        let outcome = CommandOutcome {
            command: kind.name(),
            observed,
            elapsed: started.elapsed(),
        };
        info!(command = outcome.command, elapsed = ?outcome.elapsed, "command completed");
        Ok(outcome)
    }

    async fn await_effect(&self, effect: Effect, deadline: Instant) -> Result<(), CommandError> {
        let mut view = self.view.clone();
        let waited = timeout_at(
            deadline,
            view.wait_for(|v| !v.is_connected() || effect.reached(v)),
        )
        .await;
        match waited {
            Err(_) => {
                warn!(?effect, timeout = ?self.timeout, "effect not observed");
                Err(CommandError::Timeout(self.timeout))
            }
            Ok(Err(_)) => Err(CommandError::Disconnected),
            Ok(Ok(v)) if !v.is_connected() => Err(CommandError::Disconnected),
            Ok(Ok(_)) => Ok(()),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("hexapod", &self.hexapod)
            .field("timeout", &self.timeout)
            .field("target_pending", &self.target_pending())
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
