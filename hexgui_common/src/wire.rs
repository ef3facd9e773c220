//! Wire codec for the controller link.
//!
//! Every message is one frame: a `u32` big-endian payload length followed by
//! the bincode payload. Frames larger than [`MAX_FRAME_BYTES`] are refused in
//! both directions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::consts::MAX_FRAME_BYTES;
use crate::controller::{ControllerConfig, TelemetryFrame, WireCommand};
use crate::transport::TransportError;

/// Controller → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerMessage {
    Telemetry(Box<TelemetryFrame>),
    Config(ControllerConfig),
    /// Reply to the command carrying `counter`.
    Ack {
        counter: u32,
        accepted: bool,
        reason: Option<String>,
    },
}

impl ControllerMessage {
    pub fn accepted(counter: u32) -> Self {
        Self::Ack {
            counter,
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(counter: u32, reason: impl Into<String>) -> Self {
        Self::Ack {
            counter,
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Client → controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Command(WireCommand),
}

/// Serialize `msg` into a complete frame (length prefix included).
pub fn encode_frame<M: Serialize>(msg: &M) -> Result<Vec<u8>, TransportError> {
    let payload =
        bincode::serialize(msg).map_err(|e| TransportError::ProtocolDesync(e.to_string()))?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Deserialize a frame payload (length prefix stripped).
pub fn decode_payload<M: DeserializeOwned>(payload: &[u8]) -> Result<M, TransportError> {
    bincode::deserialize(payload).map_err(|e| TransportError::ProtocolDesync(e.to_string()))
}

/// Write one framed message and flush.
pub async fn write_message<W, M>(writer: &mut W, msg: &M) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    M: Serialize,
{
    let frame = encode_frame(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message.
///
/// A clean end of stream before the length prefix yields
/// [`TransportError::Closed`]. Not cancel safe: run it in a dedicated task.
pub async fn read_message<R, M>(reader: &mut R) -> Result<M, TransportError>
where
    R: AsyncRead + Unpin,
    M: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::Closed);
        }
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    decode_payload(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CommandKind, StateTrigger};

    #[test]
    fn frame_has_big_endian_length_prefix() {
        let msg = ControllerMessage::accepted(3);
        let frame = encode_frame(&msg).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        let decoded: ControllerMessage = decode_payload(&frame[4..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn garbage_payload_is_desync() {
        let result: Result<ControllerMessage, _> = decode_payload(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(result, Err(TransportError::ProtocolDesync(_))));
    }

    #[tokio::test]
    async fn stream_roundtrip_and_close() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let cmd = ClientMessage::Command(CommandKind::SetState(StateTrigger::Enable).to_wire(1));

        write_message(&mut client, &cmd).await.unwrap();
        let received: ClientMessage = read_message(&mut server).await.unwrap();
        assert_eq!(received, cmd);

        drop(client);
        let result: Result<ClientMessage, _> = read_message(&mut server).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn oversized_length_is_refused() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&((MAX_FRAME_BYTES as u32) + 1).to_be_bytes())
            .await
            .unwrap();
        let result: Result<ControllerMessage, _> = read_message(&mut server).await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge(_))));
    }
}
