//! TCP server answering echo requests.
//!
//! One task per accepted connection. A task runs the responder handshake when
//! a credential is configured and then hands the stream to the RPC layer.
//! Connection failures never reach the accept loop.

use crate::auth::Secret;
use crate::codec::WireCodec;
use crate::config::ServerSettings;
use crate::connection::ConnState;
use crate::handshake;
use crate::rpc::{self, Router};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance, bound and ready to accept.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    settings: ServerSettings,
    codec: WireCodec,
    router: Arc<Router>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket. Failure here is fatal to the process.
    pub async fn bind(settings: ServerSettings, codec: WireCodec, router: Router) -> io::Result<Self> {
        let addr = tokio::net::lookup_host(&settings.listen)
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("listen address '{}' did not resolve", settings.listen),
                )
            })?;

        let listener = TcpListener::from_std(create_listener(addr)?)?;
        let local_addr = listener.local_addr()?;
        info!(
            address = %local_addr,
            auth = settings.secret.is_some(),
            "Server listening"
        );

        Ok(Server {
            listener,
            local_addr,
            connection_limit: Arc::new(Semaphore::new(settings.max_connections)),
            settings,
            codec,
            router: Arc::new(router),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Span tagging every log line of the accept loop and its connections.
    pub fn span(&self) -> Span {
        info_span!("server", module = "server")
    }

    /// Accept connections until `shutdown` is cancelled. Cancellation also
    /// interrupts an accept that is blocked; the listening socket is closed
    /// when this returns. Connections already being served run to completion.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&self.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");

                    let secret = self.settings.secret.clone();
                    let codec = self.codec;
                    let router = Arc::clone(&self.router);
                    let handshake_timeout = self.settings.handshake_timeout;

                    tokio::spawn(
                        async move {
                            handle_connection(stream, peer, secret, codec, router, handshake_timeout)
                                .await;
                            drop(permit);
                        }
                        .in_current_span(),
                    );
                }
                Err(e) => {
                    // Pause so a persistent error (e.g. EMFILE) cannot spin the loop.
                    warn!(
                        error = %e,
                        backoff = ?self.settings.accept_backoff,
                        "Failed to accept connection"
                    );
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.accept_backoff) => {}
                    }
                }
            }
        }

        info!(address = %self.local_addr, "Server stopped");
    }
}

/// Run one connection unit. The stream is closed on every exit path.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    secret: Option<Secret>,
    codec: WireCodec,
    router: Arc<Router>,
    handshake_timeout: Duration,
) {
    let mut transport = codec.framed(stream);
    let mut state = ConnState::after_connect(secret.is_some(), true);

    if let Some(secret) = &secret {
        if let Err(e) = handshake::respond(&mut transport, secret, &codec, handshake_timeout).await {
            if e.is_auth_failure() {
                warn!(remote = %peer, phase = %state, error = %e, "Auth failed");
            } else {
                debug!(remote = %peer, phase = %state, error = %e, "Connection lost during handshake");
            }
            return;
        }
        state = ConnState::Authenticated;
        debug!(remote = %peer, phase = %state, "Client authenticated");
        state = ConnState::Serving;
    }

    match rpc::serve(transport, &router, &codec).await {
        Ok(()) => debug!(remote = %peer, phase = %ConnState::Closed, "Connection closed by client"),
        Err(e) => debug!(remote = %peer, phase = %state, error = %e, "Connection error"),
    }
}

/// Create a TCP listener with SO_REUSEADDR so restarts can rebind while old
/// connections linger in TIME_WAIT.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
