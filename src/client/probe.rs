//! Reconnecting probe lifecycle for one remote target.
//!
//! ```text
//!        +---------------------- retry_delay ----------------------+
//!        v                                                         |
//!   Dialing --ok--> Authenticating --ok--> Probing --echo error--> Closed
//!      |                  |
//!      +-- error ---------+--------------------------------------> Closed
//! ```
//!
//! The retry delay is constant. Cancellation is observed between steps and
//! while waiting; an in-flight dial, handshake or echo is not interrupted.

use super::{Client, Session};
use crate::config::ClientSettings;
use crate::connection::ConnState;
use crate::error::ProbeError;
use crate::protocols::echo::{now_nanos, Echo, Measurement};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Span};

/// Lifecycle milestones, for callers that want to observe a prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEvent {
    /// Dialing or authentication failed.
    ConnectFailed,
    /// Session established; probing starts.
    Connected,
    /// An echo came back.
    Latency(Duration),
    /// An echo came back with a timestamp later than its arrival.
    Reversed,
    /// An echo call failed; the session is torn down.
    EchoFailed,
}

/// Probes one remote for the life of the process (or until cancelled).
pub struct Prober {
    client: Client,
    interval: Duration,
    retry_delay: Duration,
    events: Option<mpsc::UnboundedSender<ProbeEvent>>,
}

impl Prober {
    pub fn new(client: Client, settings: &ClientSettings) -> Self {
        Self {
            client,
            interval: settings.interval,
            retry_delay: settings.retry_delay,
            events: None,
        }
    }

    /// Report lifecycle milestones on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ProbeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Span tagging every log line of this lifecycle with its remote.
    pub fn span(&self) -> Span {
        info_span!("client", module = "client", remote = %self.client.addr())
    }

    fn emit(&self, event: ProbeEvent) {
        if let Some(events) = &self.events {
            // Observer gone is not our problem.
            let _ = events.send(event);
        }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let remote = self.client.addr().to_string();

        while !shutdown.is_cancelled() {
            match self.connect(&remote).await {
                Ok(session) => {
                    info!(remote = %remote, phase = %ConnState::Probing, "Connected");
                    self.emit(ProbeEvent::Connected);
                    self.probe(session, &remote, &shutdown).await;
                }
                Err(_) => self.emit(ProbeEvent::ConnectFailed),
            }

            if shutdown.is_cancelled() {
                break;
            }
            debug!(remote = %remote, delay = ?self.retry_delay, "Waiting before reconnect");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        debug!(remote = %remote, "Prober stopped");
    }

    async fn connect(&self, remote: &str) -> Result<Session, ProbeError> {
        let mut state = ConnState::Dialing;
        let transport = self.client.dial().await.inspect_err(|e| {
            error!(remote = %remote, phase = %state, error = %e, "Connect failed");
        })?;

        if self.client.needs_auth() {
            state = ConnState::Authenticating;
        }
        self.client.authenticate(transport).await.inspect_err(|e| {
            error!(remote = %remote, phase = %state, error = %e, "Connect failed");
        })
    }

    /// Echo on every tick until a call fails or shutdown. The session is
    /// closed on return.
    async fn probe(&self, mut session: Session, remote: &str, shutdown: &CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let ping = Echo::now();
            let reply = match session.echo(&ping).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(remote = %remote, phase = %ConnState::Probing, error = %e, "Echo failed");
                    self.emit(ProbeEvent::EchoFailed);
                    break;
                }
            };

            match Measurement::from_timestamps(reply.timestamp, now_nanos()) {
                Measurement::Latency(latency) => {
                    info!(
                        remote = %remote,
                        latency = latency.as_millis() as u64,
                        "success response"
                    );
                    self.emit(ProbeEvent::Latency(latency));
                }
                Measurement::Reversed => {
                    warn!(remote = %remote, "timestamp reversed, ignore");
                    self.emit(ProbeEvent::Reversed);
                }
            }
        }

        session.close();
        debug!(remote = %remote, phase = %ConnState::Closed, "Session closed");
    }
}
