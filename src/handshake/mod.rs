//! Mutual challenge-response authentication.
//!
//! Each side proves it holds the shared secret by transforming a nonce it did
//! not choose. The secret itself never crosses the wire and the channel is not
//! encrypted afterwards. There is no replay cache; freshness of the random
//! challenges is the only replay protection.
//!
//! [`initiate`] and [`respond`] drive the I/O around the [`Initiator`] and
//! [`Responder`] state machines. Every read gets its own deadline, applied
//! only for the duration of that read.

pub mod messages;
pub mod protocol;
pub mod state;

pub use protocol::{Initiator, Responder};

use crate::auth::Secret;
use crate::codec::{Transport, WireCodec};
use crate::error::{ProbeError, Result};
use messages::{Hello, HelloResponse, Hi, HiResponse};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

/// Default bound on each handshake read.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

async fn recv_within<T, M>(
    codec: &WireCodec,
    transport: &mut Transport<T>,
    timeout: Duration,
    phase: &'static str,
) -> Result<M>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: DeserializeOwned,
{
    match tokio::time::timeout(timeout, codec.recv(transport)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::HandshakeTimeout { phase }),
    }
}

/// Run the initiator role. On error the caller must close the transport.
pub async fn initiate<T>(
    transport: &mut Transport<T>,
    secret: &Secret,
    codec: &WireCodec,
    timeout: Duration,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut initiator = Initiator::new(secret.clone());

    let hello = initiator.hello()?;
    codec.send(transport, &hello).await?;
    trace!("sent Hello");

    let hello_rsp: HelloResponse =
        recv_within(codec, transport, timeout, "HelloResponse").await?;
    let hi = initiator.on_hello_response(hello_rsp)?;
    codec.send(transport, &hi).await?;
    trace!("sent Hi");

    let hi_rsp: HiResponse = recv_within(codec, transport, timeout, "HiResponse").await?;
    initiator.on_hi_response(hi_rsp)
}

/// Run the responder role. A wrong proof is still answered with
/// `welcome = false` before the error is returned.
pub async fn respond<T>(
    transport: &mut Transport<T>,
    secret: &Secret,
    codec: &WireCodec,
    timeout: Duration,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut responder = Responder::new(secret.clone());

    let hello: Hello = recv_within(codec, transport, timeout, "Hello").await?;
    let hello_rsp = responder.on_hello(hello)?;
    codec.send(transport, &hello_rsp).await?;
    trace!("sent HelloResponse");

    let hi: Hi = recv_within(codec, transport, timeout, "Hi").await?;
    let hi_rsp = responder.on_hi(hi)?;
    codec.send(transport, &hi_rsp).await?;
    trace!(welcome = hi_rsp.welcome, "sent HiResponse");

    if responder.is_authenticated() {
        Ok(())
    } else {
        Err(ProbeError::AuthenticationFailed(
            "client failed to prove it holds the secret",
        ))
    }
}
