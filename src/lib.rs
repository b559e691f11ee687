//! netprobe: a network reachability and latency probe.
//!
//! A server answers echo requests; clients ping one or more servers on a
//! fixed interval and log round-trip latency. Every connection can be gated
//! by a mutual challenge-response handshake over a shared secret.
//!
//! Features:
//! - Four-message mutual authentication (`Hello`, `HelloResponse`, `Hi`, `HiResponse`)
//! - One task per accepted connection and per probed remote
//! - Constant-delay reconnect on any client failure
//! - Configuration via CLI arguments or TOML file

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod protocols;
pub mod rpc;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;
