//! Session manager.
//!
//! Owns at most one link. The published view outlives individual links, so
//! subscribers keep working across reconnects; everything else (I/O task,
//! dispatcher, pending target) is per link and starts fresh on connect.

use std::sync::Arc;

use hexgui_common::config::HexguiConfig;
use hexgui_common::controller::{CommandRequest, CommandSource, HexapodKind};
use hexgui_common::transport::{Connector, TransportError};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::io_loop::{IoLoop, LinkExit};
use super::view::ControllerView;
use crate::command::{CommandOutcome, Confirm, Dispatcher};
use crate::error::{CommandError, SessionError};
use crate::telemetry::Ingest;

/// Capacity of the dispatcher → I/O task request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

const DISCONNECT_PROMPT: &str =
    "This GUI holds command authority. Disconnecting leaves the controller without an \
     active commander. Disconnect anyway?";

struct ActiveLink {
    dispatcher: Arc<Dispatcher>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<LinkExit>,
}

/// One controller session per application instance.
pub struct Session {
    config: HexguiConfig,
    hexapod: HexapodKind,
    connector: Arc<dyn Connector>,
    confirm: Arc<dyn Confirm>,
    view: Arc<watch::Sender<ControllerView>>,
    active: Mutex<Option<ActiveLink>>,
}

impl Session {
    pub fn new(
        config: HexguiConfig,
        hexapod: HexapodKind,
        connector: Arc<dyn Connector>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let (view, _) = watch::channel(ControllerView::disconnected());
        Self {
            config,
            hexapod,
            connector,
            confirm,
            view: Arc::new(view),
            active: Mutex::new(None),
        }
    }

    #[inline]
    pub fn config(&self) -> &HexguiConfig {
        &self.config
    }

    #[inline]
    pub fn hexapod(&self) -> HexapodKind {
        self.hexapod
    }

    /// Current snapshot.
    pub fn view(&self) -> ControllerView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.view.subscribe()
    }

    /// An I/O task is running.
    pub fn is_linked(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    /// Open a link, replacing any current one.
    ///
    /// Returns once the link is up; the state stays unknown until the first
    /// telemetry frame arrives.
    ///
    /// # Errors
    ///
    /// [`SessionError::Transport`] if the connector fails or does not
    /// answer within the connection timeout; [`SessionError::Cancelled`] if
    /// the operator declined to drop the current link.
    pub async fn connect(&self) -> Result<(), SessionError> {
        if self.is_linked() {
            self.disconnect().await?;
        } else {
            self.reap().await;
        }

        let connection = &self.config.connection;
        let timeout = connection.timeout();
        info!(
            transport = self.connector.name(),
            address = %connection.address(),
            "connecting"
        );
        let link = match tokio::time::timeout(timeout, self.connector.connect(connection)).await {
            Ok(link) => link?,
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    address: connection.address(),
                    timeout,
                }
                .into());
            }
        };

        let (req_tx, req_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let io = IoLoop::new(
            link,
            Ingest::new(&self.config),
            Arc::clone(&self.view),
            req_rx,
            shutdown_rx,
            self.config.telemetry.stale_timeout(),
        );
        let dispatcher = Dispatcher::new(
            self.view.subscribe(),
            req_tx,
            Arc::clone(&self.confirm),
            &self.config,
            self.hexapod,
        );
        let active = ActiveLink {
            dispatcher: Arc::new(dispatcher),
            shutdown: shutdown_tx,
            task: tokio::spawn(io.run()),
        };
        *self.active.lock() = Some(active);
        info!(transport = self.connector.name(), "connected");
        Ok(())
    }

    /// Close the link.
    ///
    /// Asks for confirmation while this GUI holds command authority.
    ///
    /// # Errors
    ///
    /// [`SessionError::Cancelled`] if the operator declined.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let holds_authority = {
            let view = self.view.borrow();
            view.is_connected() && view.commander == Some(CommandSource::Gui)
        };
        if holds_authority && !self.confirm.confirm(DISCONNECT_PROMPT) {
            return Err(SessionError::Cancelled);
        }

        let active = self.active.lock().take();
        if let Some(active) = active {
            // The task may already have ended on its own.
            let _ = active.shutdown.send(());
            Self::join(active.task).await;
            info!("disconnected");
        }
        Ok(())
    }

    /// Clean up after a link that ended on its own.
    async fn reap(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            Self::join(active.task).await;
        }
    }

    async fn join(task: JoinHandle<LinkExit>) {
        if let Err(e) = task.await {
            warn!(error = %e, "session I/O task failed");
        }
    }

    /// Submit one command through the current link.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::submit`]; [`CommandError::Disconnected`] without a
    /// link.
    pub async fn submit(&self, request: CommandRequest) -> Result<CommandOutcome, CommandError> {
        let dispatcher = self
            .active
            .lock()
            .as_ref()
            .map(|a| Arc::clone(&a.dispatcher));
        match dispatcher {
            Some(dispatcher) => dispatcher.submit(request).await,
            None => Err(CommandError::Disconnected),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("hexapod", &self.hexapod)
            .field("transport", &self.connector.name())
            .field("linked", &self.is_linked())
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
