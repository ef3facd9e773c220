//! Session I/O task.
//!
//! One task per link. It owns the [`ControllerLink`] and the [`Ingest`]
//! state and is the only writer of the published [`ControllerView`].
//! Inbound telemetry, acknowledgements, outbound commands and the stale
//! watchdog are serialized in one `select!` loop, so a command's
//! eligibility check always sees a fully applied frame.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hexgui_common::controller::CommandKind;
use hexgui_common::transport::{ControllerLink, TransportError};
use hexgui_common::wire::ControllerMessage;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::view::ControllerView;
use crate::error::CommandError;
use crate::telemetry::Ingest;
use crate::state::Transition;

/// Reply to one transmitted command: `Ok` on a positive acknowledgement.
pub type CommandReply = Result<(), CommandError>;

/// Command handed from the dispatcher to the I/O task.
#[derive(Debug)]
pub struct IoRequest {
    pub kind: CommandKind,
    /// Dropped without a reply if the link goes away.
    pub reply: oneshot::Sender<CommandReply>,
}

/// Why the I/O task ended.
#[derive(Debug)]
pub enum LinkExit {
    /// Closed by the session.
    Shutdown,
    Lost(TransportError),
}

#[derive(Debug)]
struct Pending {
    kind: CommandKind,
    reply: oneshot::Sender<CommandReply>,
}

impl Pending {
    /// Whether the entry still matters: someone awaits the reply, or the
    /// acknowledgement changes local state.
    fn is_live(&self) -> bool {
        !self.reply.is_closed() || matches!(self.kind, CommandKind::MaskLimitSwitch(_))
    }
}

pub struct IoLoop {
    link: ControllerLink,
    ingest: Ingest,
    view: Arc<watch::Sender<ControllerView>>,
    requests: mpsc::Receiver<IoRequest>,
    shutdown: oneshot::Receiver<()>,
    stale_timeout: Duration,
    counter: u32,
    pending: HashMap<u32, Pending>,
}

impl IoLoop {
    /// Take over a fresh link. Publishes the awaiting-telemetry view.
    pub fn new(
        link: ControllerLink,
        mut ingest: Ingest,
        view: Arc<watch::Sender<ControllerView>>,
        requests: mpsc::Receiver<IoRequest>,
        shutdown: oneshot::Receiver<()>,
        stale_timeout: Duration,
    ) -> Self {
        ingest.link_up();
        view.send_replace(ingest.view());
        Self {
            link,
            ingest,
            view,
            requests,
            shutdown,
            stale_timeout,
            counter: 0,
            pending: HashMap::new(),
        }
    }

    pub async fn run(mut self) -> LinkExit {
        let stale = sleep(self.stale_timeout);
        tokio::pin!(stale);

        let exit = loop {
            tokio::select! {
                _ = &mut self.shutdown => break LinkExit::Shutdown,

                () = &mut stale => {
                    break LinkExit::Lost(TransportError::TelemetryStale(self.stale_timeout));
                }

                event = self.link.events.recv() => match event {
                    None => break LinkExit::Lost(TransportError::Closed),
                    Some(Err(e)) => break LinkExit::Lost(e),
                    Some(Ok(msg)) => {
                        if matches!(msg, ControllerMessage::Telemetry(_)) {
                            stale.as_mut().reset(Instant::now() + self.stale_timeout);
                        }
                        if let Err(e) = self.handle_message(msg) {
                            break LinkExit::Lost(e);
                        }
                    }
                },

                request = self.requests.recv() => match request {
                    None => break LinkExit::Shutdown,
                    Some(request) => {
                        if let Err(e) = self.transmit(request).await {
                            break LinkExit::Lost(e);
                        }
                    }
                },
            }
        };

        match &exit {
            LinkExit::Shutdown => info!("link closed"),
            LinkExit::Lost(e) => warn!(error = %e, "link lost"),
        }
        // Pending replies are dropped: their commands resolve as disconnected.
        self.pending.clear();
        self.ingest.link_down();
        self.publish();
        exit
    }

    fn publish(&self) {
        self.view.send_replace(self.ingest.view());
    }

    fn handle_message(&mut self, msg: ControllerMessage) -> Result<(), TransportError> {
        match msg {
            ControllerMessage::Telemetry(frame) => {
                let outcome = self
                    .ingest
                    .apply_frame(*frame)
                    .map_err(|e| TransportError::ProtocolDesync(e.to_string()))?;
                if let Transition::Ok(state) = outcome.transition {
                    debug!(state = state.name(), "view updated");
                }
                self.publish();
            }
            ControllerMessage::Config(config) => {
                self.ingest.apply_config(config);
                self.publish();
            }
            ControllerMessage::Ack {
                counter,
                accepted,
                reason,
            } => self.acknowledge(counter, accepted, reason),
        }
        Ok(())
    }

    fn acknowledge(&mut self, counter: u32, accepted: bool, reason: Option<String>) {
        let Some(pending) = self.pending.remove(&counter) else {
            debug!(counter, "acknowledgement for unknown command");
            return;
        };
        let reply = if accepted {
            if let CommandKind::MaskLimitSwitch(direction) = pending.kind {
                self.ingest.arm_mask(direction);
                self.publish();
            }
            Ok(())
        } else {
            let reason = reason.unwrap_or_else(|| "no reason given".to_string());
            Err(CommandError::RejectedByController(reason))
        };
        // The submitter may have timed out already.
        let _ = pending.reply.send(reply);
    }

    async fn transmit(&mut self, request: IoRequest) -> Result<(), TransportError> {
        self.pending.retain(|_, p| p.is_live());

        self.counter = self.counter.wrapping_add(1);
        let wire = request.kind.to_wire(self.counter);
        debug!(counter = self.counter, command = request.kind.name(), "transmit");
        if self.link.commands.send(wire).await.is_err() {
            let _ = request.reply.send(Err(CommandError::Disconnected));
            return Err(TransportError::Closed);
        }
        self.pending.insert(
            self.counter,
            Pending {
                kind: request.kind,
                reply: request.reply,
            },
        );
        Ok(())
    }
}

impl std::fmt::Debug for IoLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoLoop")
            .field("counter", &self.counter)
            .field("pending", &self.pending.len())
            .field("stale_timeout", &self.stale_timeout)
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
