//! Transport abstraction between the session and a controller.
//!
//! A [`Connector`] opens a [`ControllerLink`]: a pair of channels carrying
//! outbound commands and inbound controller messages. The live TCP link and
//! the in-process simulator both implement it, so the session does not know
//! which one it talks to.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ConnectionConfig;
use crate::controller::WireCommand;
use crate::wire::ControllerMessage;

/// Capacity of the link channels.
pub const LINK_CHANNEL_CAPACITY: usize = 64;

/// Transport-level failure. Any of these forces the disconnected state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {0} refused")]
    ConnectRefused(String),

    #[error("connection to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("protocol desync: {0}")]
    ProtocolDesync(String),

    #[error("frame of {0} bytes exceeds the maximum")]
    FrameTooLarge(usize),

    #[error("no telemetry for {0:?}")]
    TelemetryStale(Duration),
}

/// Item delivered on the inbound side of a link.
pub type LinkEvent = Result<ControllerMessage, TransportError>;

/// An open connection to a controller.
///
/// Dropping the command sender closes the link; the inbound channel closing
/// (or yielding an error) means the link is gone.
#[derive(Debug)]
pub struct ControllerLink {
    pub commands: mpsc::Sender<WireCommand>,
    pub events: mpsc::Receiver<LinkEvent>,
}

impl ControllerLink {
    /// Create both channel pairs; returns the link and the far-end halves.
    pub fn pair() -> (Self, LinkEndpoint) {
        let (cmd_tx, cmd_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (evt_tx, evt_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        (
            Self {
                commands: cmd_tx,
                events: evt_rx,
            },
            LinkEndpoint {
                commands: cmd_rx,
                events: evt_tx,
            },
        )
    }
}

/// Far end of a [`ControllerLink`], held by the transport implementation.
#[derive(Debug)]
pub struct LinkEndpoint {
    pub commands: mpsc::Receiver<WireCommand>,
    pub events: mpsc::Sender<LinkEvent>,
}

/// Something that can open a controller link.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable transport name (for logs).
    fn name(&self) -> &'static str;

    /// Open a new link.
    async fn connect(&self, config: &ConnectionConfig) -> Result<ControllerLink, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CommandKind, StateTrigger};

    #[tokio::test]
    async fn pair_connects_both_directions() {
        let (mut link, mut endpoint) = ControllerLink::pair();

        let cmd = CommandKind::SetState(StateTrigger::Standby).to_wire(5);
        link.commands.send(cmd).await.unwrap();
        assert_eq!(endpoint.commands.recv().await, Some(cmd));

        endpoint
            .events
            .send(Ok(ControllerMessage::accepted(5)))
            .await
            .unwrap();
        let event = link.events.recv().await.unwrap().unwrap();
        assert_eq!(event, ControllerMessage::accepted(5));

        drop(endpoint);
        assert!(link.events.recv().await.is_none());
    }

    #[test]
    fn errors_render() {
        let e = TransportError::ConnectTimeout {
            address: "127.0.0.1:5560".into(),
            timeout: Duration::from_secs(10),
        };
        assert!(e.to_string().contains("127.0.0.1:5560"));
        assert_eq!(TransportError::Closed.to_string(), "connection closed by peer");
    }
}
