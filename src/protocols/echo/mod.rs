//! Echo operation: the only application call served after authentication.
//!
//! The client sends the current time and the server returns it unchanged, so
//! the client can derive round-trip latency from its own clock alone:
//!
//! ```text
//! Request:  Echo.Echo {"timestamp": 1700000000123456789}
//! Response:           {"timestamp": 1700000000123456789}
//! ```
//!
//! Timestamps are nanoseconds since the Unix epoch.

pub mod handler;

pub use handler::{echo, register, METHOD};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Echo payload, used for both the request and the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub timestamp: i64,
}

impl Echo {
    /// A payload stamped with the current wall-clock time.
    pub fn now() -> Self {
        Self {
            timestamp: now_nanos(),
        }
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    let now = Utc::now();
    // Outside the i64 nanosecond range (years before 1677 or after 2262)
    // fall back to microsecond precision.
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// Round-trip latency.
    Latency(Duration),
    /// The reply arrived "before" its request: the clock moved backward or
    /// the reply is stale.
    Reversed,
}

impl Measurement {
    /// Compare the timestamp carried by a reply with its arrival time.
    pub fn from_timestamps(sent: i64, received: i64) -> Self {
        if received >= sent {
            let nanos = received.abs_diff(sent);
            Measurement::Latency(Duration::from_nanos(nanos))
        } else {
            Measurement::Reversed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency() {
        assert_eq!(
            Measurement::from_timestamps(1_000, 3_001_000),
            Measurement::Latency(Duration::from_millis(3))
        );
        assert_eq!(
            Measurement::from_timestamps(5, 5),
            Measurement::Latency(Duration::ZERO)
        );
    }

    #[test]
    fn test_reversed_clock() {
        assert_eq!(Measurement::from_timestamps(10, 9), Measurement::Reversed);
    }

    #[test]
    fn test_now_stamps_wall_clock() {
        // 2020-01-01T00:00:00Z in nanoseconds.
        assert!(Echo::now().timestamp > 1_577_836_800_000_000_000);
    }
}
