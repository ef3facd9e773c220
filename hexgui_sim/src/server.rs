//! TCP mock server.
//!
//! Each accepted client gets its own [`drive_link`] task on the shared mock
//! controller, bridged to the socket by a reader and a writer task.

use std::net::SocketAddr;
use std::time::Duration;

use hexgui_common::transport::{ControllerLink, TransportError};
use hexgui_common::wire::{read_message, write_message, ClientMessage};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::connector::{drive_link, SharedController};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[from] std::io::Error),
}

/// Bind the mock server on `address`.
pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Accept clients forever.
pub async fn serve(
    listener: TcpListener,
    controller: SharedController,
    period: Duration,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock controller listening");
    }
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "client connected");
        tokio::spawn(handle_client(stream, peer, controller.clone(), period));
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    controller: SharedController,
    period: Duration,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "set_nodelay failed");
    }
    let (mut rd, mut wr) = stream.into_split();
    let (link, endpoint) = ControllerLink::pair();
    let ControllerLink {
        commands,
        mut events,
    } = link;

    let driver = tokio::spawn(drive_link(controller, endpoint, period));

    let reader = tokio::spawn(async move {
        loop {
            match read_message::<_, ClientMessage>(&mut rd).await {
                Ok(ClientMessage::Command(cmd)) => {
                    if commands.send(cmd).await.is_err() {
                        break;
                    }
                }
                Err(TransportError::Closed) => {
                    debug!(%peer, "client closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "dropping client");
                    break;
                }
            }
        }
    });

    while let Some(event) = events.recv().await {
        let Ok(msg) = event else { break };
        if let Err(e) = write_message(&mut wr, &msg).await {
            debug!(%peer, error = %e, "write failed");
            break;
        }
    }

    reader.abort();
    driver.abort();
    info!(%peer, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::MockController;
    use hexgui_common::controller::{CommandKind, HexapodKind, StateTrigger};
    use hexgui_common::wire::ControllerMessage;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn tcp_client_gets_config_and_ack() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let controller = Arc::new(Mutex::new(MockController::new(HexapodKind::M2)));
        tokio::spawn(serve(listener, controller.clone(), Duration::from_millis(10)));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut rd, mut wr) = stream.into_split();

        let first: ControllerMessage = read_message(&mut rd).await.unwrap();
        assert!(matches!(first, ControllerMessage::Config(_)));

        let cmd = CommandKind::SetState(StateTrigger::Enable).to_wire(42);
        write_message(&mut wr, &ClientMessage::Command(cmd))
            .await
            .unwrap();
        loop {
            let msg: ControllerMessage = read_message(&mut rd).await.unwrap();
            if let ControllerMessage::Ack { counter, accepted, .. } = msg {
                assert_eq!(counter, 42);
                assert!(accepted);
                break;
            }
        }
        assert!(controller.lock().state().is_enabled());
    }

    #[tokio::test]
    async fn bind_error_names_address() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let err = bind(&addr).await.unwrap_err();
        assert!(err.to_string().contains(&addr));
    }
}
