//! Application operations served over the RPC layer.
//!
//! - `echo`: returns its payload unchanged; the basis of latency probing.

pub mod echo;
