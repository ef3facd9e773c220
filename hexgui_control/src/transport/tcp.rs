//! TCP transport.
//!
//! A reader task turns inbound frames into link events; the bridge task
//! writes outbound commands. Framing reads are not cancel safe, so neither
//! side is ever raced in a `select!`.

use async_trait::async_trait;
use hexgui_common::config::ConnectionConfig;
use hexgui_common::transport::{Connector, ControllerLink, LinkEndpoint, TransportError};
use hexgui_common::wire::{read_message, write_message, ClientMessage, ControllerMessage};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Connects to a controller over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<ControllerLink, TransportError> {
        let address = config.address();
        let timeout = config.timeout();
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Err(_) => return Err(TransportError::ConnectTimeout { address, timeout }),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                return Err(TransportError::ConnectRefused(address));
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(stream)) => stream,
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }
        info!(%address, "tcp link established");

        let (link, endpoint) = ControllerLink::pair();
        tokio::spawn(bridge(stream, endpoint));
        Ok(link)
    }
}

/// Move frames between the socket and the link until either side closes.
async fn bridge(stream: TcpStream, endpoint: LinkEndpoint) {
    let (mut rd, mut wr) = stream.into_split();
    let LinkEndpoint {
        mut commands,
        events,
    } = endpoint;

    let inbound = events.clone();
    let reader = tokio::spawn(async move {
        loop {
            match read_message::<_, ControllerMessage>(&mut rd).await {
                Ok(msg) => {
                    if inbound.send(Ok(msg)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "tcp reader stopped");
                    let _ = inbound.send(Err(e)).await;
                    break;
                }
            }
        }
    });

    while let Some(cmd) = commands.recv().await {
        if let Err(e) = write_message(&mut wr, &ClientMessage::Command(cmd)).await {
            warn!(error = %e, "tcp write failed");
            let _ = events.send(Err(e)).await;
            break;
        }
    }

    reader.abort();
    debug!("tcp link closed");
}

// ─── Tests ──────────────────────────────────────────────────────────
