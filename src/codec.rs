//! Wire codec: length-prefixed frames, one JSON document per frame.
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32 BE)| JSON-encoded message      |
//! +----------------+---------------------------+
//! ```
//!
//! A single `WireCodec` value is built at startup and passed to every
//! component that reads or writes messages.

use crate::error::{ProbeError, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// A byte stream framed for typed message exchange.
pub type Transport<T> = Framed<T, LengthDelimitedCodec>;

/// Codec configuration shared by the server and every client.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    max_frame_length: usize,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl WireCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }

    /// Wrap a raw stream. The stream is owned by the returned transport and
    /// closed when it is dropped.
    pub fn framed<T: AsyncRead + AsyncWrite>(&self, io: T) -> Transport<T> {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_length)
            .new_codec();
        Framed::new(io, codec)
    }

    /// Serialize `msg` as one frame and flush it.
    pub async fn send<T, M>(&self, transport: &mut Transport<T>, msg: &M) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
        M: Serialize,
    {
        let payload = serde_json::to_vec(msg)?;
        transport.send(Bytes::from(payload)).await?;
        Ok(())
    }

    /// Read one frame and decode it as `M`.
    pub async fn recv<T, M>(&self, transport: &mut Transport<T>) -> Result<M>
    where
        T: AsyncRead + AsyncWrite + Unpin,
        M: DeserializeOwned,
    {
        match transport.next().await {
            Some(Ok(frame)) => Ok(serde_json::from_slice(&frame)?),
            Some(Err(e)) => Err(ProbeError::Transport(e)),
            None => Err(ProbeError::ConnectionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    #[tokio::test]
    async fn test_send_recv_over_duplex() {
        let codec = WireCodec::default();
        let (a, b) = tokio::io::duplex(1024);
        let mut left = codec.framed(a);
        let mut right = codec.framed(b);

        codec.send(&mut left, &Ping { seq: 7 }).await.unwrap();
        let got: Ping = codec.recv(&mut right).await.unwrap();
        assert_eq!(got, Ping { seq: 7 });
    }

    #[tokio::test]
    async fn test_frame_layout() {
        let frame = b"\x00\x00\x00\x09{\"seq\":1}";
        let mock = tokio_test::io::Builder::new().read(frame).build();
        let codec = WireCodec::default();
        let mut transport = codec.framed(mock);

        let got: Ping = codec.recv(&mut transport).await.unwrap();
        assert_eq!(got.seq, 1);
    }

    #[tokio::test]
    async fn test_recv_on_closed_stream() {
        let codec = WireCodec::default();
        let (a, b) = tokio::io::duplex(64);
        drop(a);
        let mut transport = codec.framed(b);

        let err = codec.recv::<_, Ping>(&mut transport).await.unwrap_err();
        assert!(matches!(err, ProbeError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_recv_malformed_payload() {
        let mock = tokio_test::io::Builder::new()
            .read(b"\x00\x00\x00\x03abc")
            .build();
        let codec = WireCodec::default();
        let mut transport = codec.framed(mock);

        let err = codec.recv::<_, Ping>(&mut transport).await.unwrap_err();
        assert!(matches!(err, ProbeError::Decode(_)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mock = tokio_test::io::Builder::new()
            .read(b"\x00\x00\x10\x00")
            .build();
        let codec = WireCodec::new(16);
        let mut transport = codec.framed(mock);

        let err = codec.recv::<_, Ping>(&mut transport).await.unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)));
    }
}
