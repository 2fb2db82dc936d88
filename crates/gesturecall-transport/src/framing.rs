//! Length-prefixed JSON framing.
//!
//! Each frame is a 4-byte big-endian body length followed by a JSON body.

use bytes::{BufMut, BytesMut};
use gesturecall_core::TransportError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::trace;

/// Largest accepted frame body.
pub const MAX_FRAME_LEN: usize = 1_048_576;

pub async fn write_frame<T: Serialize>(
    stream: &mut (impl AsyncWriteExt + Unpin),
    msg: &T,
) -> Result<(), TransportError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_FRAME_LEN {
        return Err(TransportError::MessageTooLarge { len: json.len(), max: MAX_FRAME_LEN });
    }
    let mut frame = BytesMut::with_capacity(4 + json.len());
    frame.put_u32(json.len() as u32);
    frame.put_slice(&json);
    stream.write_all(&frame).await?;
    stream.flush().await?;
    trace!("Sent frame ({} bytes)", json.len());
    Ok(())
}

/// Read one frame. A clean EOF before the length prefix is reported as
/// [`TransportError::ConnectionClosed`].
pub async fn read_frame<T: DeserializeOwned>(
    stream: &mut (impl AsyncReadExt + Unpin),
) -> Result<T, TransportError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(eof_as_closed)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::MessageTooLarge { len, max: MAX_FRAME_LEN });
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.map_err(eof_as_closed)?;
    trace!("Received frame ({} bytes)", len);
    Ok(serde_json::from_slice(&body)?)
}

fn eof_as_closed(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::ConnectionClosed
    } else {
        TransportError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesturecall_core::{GestureLabel, GestureMessage};

    #[tokio::test]
    async fn frame_carries_length_prefix() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let msg = GestureMessage::gesture(GestureLabel::sign("C"));
        write_frame(&mut a, &msg).await.unwrap();

        let mut len_buf = [0u8; 4];
        b.read_exact(&mut len_buf).await.unwrap();
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        b.read_exact(&mut body).await.unwrap();
        assert_eq!(body, br#"{"type":"gesture","gesture":"C"}"#);
    }

    #[tokio::test]
    async fn reads_back_written_message() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let msg = GestureMessage::gesture(GestureLabel::NoGesture);
        write_frame(&mut a, &msg).await.unwrap();
        let parsed: GestureMessage = read_frame(&mut b).await.unwrap();
        assert_eq!(parsed, msg);
    }

    #[tokio::test]
    async fn rejects_oversized_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes()).await.unwrap();
        let err = read_frame::<GestureMessage>(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { .. }), "{err}");
    }

    #[tokio::test]
    async fn eof_is_connection_closed() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let err = read_frame::<GestureMessage>(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed), "{err}");
    }
}
