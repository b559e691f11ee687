//! Client side: dialing a remote echo server and probing it.
//!
//! [`Client`] establishes one authenticated [`Session`]; [`Prober`] owns the
//! reconnecting probe lifecycle for a single remote.

mod probe;

pub use probe::{ProbeEvent, Prober};

use crate::auth::Secret;
use crate::codec::{Transport, WireCodec};
use crate::config::ClientSettings;
use crate::error::{ProbeError, Result};
use crate::handshake;
use crate::protocols::echo::{self, Echo};
use crate::rpc::RpcClient;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connection parameters for one remote target.
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
    secret: Option<Secret>,
    codec: WireCodec,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl Client {
    pub fn new(addr: impl Into<String>, settings: &ClientSettings, codec: WireCodec) -> Self {
        Self {
            addr: addr.into(),
            secret: settings.secret.clone(),
            codec,
            connect_timeout: settings.connect_timeout,
            handshake_timeout: settings.handshake_timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether [`Client::authenticate`] runs the handshake.
    pub fn needs_auth(&self) -> bool {
        self.secret.is_some()
    }

    /// Dial and, if a credential is configured, authenticate.
    pub async fn connect(&self) -> Result<Session> {
        let transport = self.dial().await?;
        self.authenticate(transport).await
    }

    /// Establish the transport connection within the connect timeout.
    pub async fn dial(&self) -> Result<Transport<TcpStream>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ProbeError::ConnectTimeout(self.connect_timeout))??;
        stream.set_nodelay(true)?;
        Ok(self.codec.framed(stream))
    }

    /// Run the initiator handshake when a credential is configured. The
    /// transport is consumed, so a failed handshake always closes it.
    pub async fn authenticate(&self, mut transport: Transport<TcpStream>) -> Result<Session> {
        if let Some(secret) = &self.secret {
            handshake::initiate(&mut transport, secret, &self.codec, self.handshake_timeout)
                .await?;
        }
        Ok(Session {
            rpc: RpcClient::new(transport, self.codec),
        })
    }
}

/// An established connection, ready for echo calls.
pub struct Session {
    rpc: RpcClient<TcpStream>,
}

impl Session {
    /// Send `ping` and wait for it to come back.
    pub async fn echo(&mut self, ping: &Echo) -> Result<Echo> {
        self.rpc.call(echo::METHOD, ping).await
    }

    /// Close the connection.
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;
    use crate::protocols::echo::{now_nanos, Measurement};
    use crate::rpc::Router;
    use crate::server::Server;
    use std::net::SocketAddr;
    use tokio_util::sync::CancellationToken;

    pub(crate) fn client_settings(token: &str) -> ClientSettings {
        ClientSettings {
            remotes: Vec::new(),
            secret: Secret::new(token),
            interval: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_millis(200),
        }
    }

    pub(crate) async fn start_server(token: &str) -> (SocketAddr, CancellationToken) {
        let settings = ServerSettings {
            listen: "127.0.0.1:0".to_string(),
            secret: Secret::new(token),
            max_connections: 16,
            handshake_timeout: Duration::from_secs(5),
            accept_backoff: Duration::from_millis(100),
        };
        let server = Server::bind(settings, WireCodec::default(), echo::register(Router::new()))
            .await
            .unwrap();
        let addr = server.local_addr();
        let shutdown = CancellationToken::new();
        tokio::spawn(server.run(shutdown.clone()));
        (addr, shutdown)
    }

    #[tokio::test]
    async fn test_end_to_end_shared_secret() {
        let (addr, shutdown) = start_server("tok").await;
        let client = Client::new(addr.to_string(), &client_settings("tok"), WireCodec::default());

        let mut session = client.connect().await.unwrap();
        let ping = Echo::now();
        let pong = session.echo(&ping).await.unwrap();
        assert_eq!(pong, ping);

        match Measurement::from_timestamps(pong.timestamp, now_nanos()) {
            Measurement::Latency(_) => {}
            Measurement::Reversed => panic!("latency should be non-negative"),
        }

        session.close();
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_end_to_end_mismatched_secrets() {
        let (addr, shutdown) = start_server("b").await;
        let client = Client::new(addr.to_string(), &client_settings("a"), WireCodec::default());

        // No session means no echo can ever be attempted.
        let err = client.connect().await.err().unwrap();
        assert!(matches!(err, ProbeError::AuthenticationFailed(_)));
        assert!(err.is_auth_failure());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unauthenticated_client_against_open_server() {
        let (addr, shutdown) = start_server("").await;
        let client = Client::new(addr.to_string(), &client_settings(""), WireCodec::default());
        assert!(!client.needs_auth());

        let mut session = client.connect().await.unwrap();
        let ping = Echo { timestamp: 77 };
        assert_eq!(session.echo(&ping).await.unwrap(), ping);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = Client::new(addr.to_string(), &client_settings(""), WireCodec::default());

        let err = client.dial().await.err().unwrap();
        assert!(matches!(err, ProbeError::Transport(_)));
    }
}
