//! Public types for the hub connection supervisor.

use std::time::Duration;

use hyperion_protocol::constants::RECONNECT_DELAY;

/// Supervisor connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet.
    Idle,
    /// WebSocket handshake in progress.
    Connecting { attempt: u32 },
    /// Stream open, reading hub events.
    Connected,
    /// Waiting out the retry delay after a failure.
    Backoff { attempt: u32 },
    /// Cancelled from outside; the loop has exited.
    Stopped,
}

/// A data frame received from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// Events emitted by the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The supervisor moved to a new state.
    StateChanged {
        hub: String,
        state: ConnectionState,
    },
    /// A connection attempt failed or the stream dropped; a retry is scheduled.
    Reconnecting {
        hub: String,
        attempt: u32,
        next_retry_secs: f64,
    },
}

/// Which enrolled hub the supervisor connects to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HubSelection {
    /// The node's preferred hub if set, otherwise the most recently
    /// enrolled one.
    #[default]
    Auto,
    /// A specific hub by name.
    Named(String),
}

/// Retry timing for the supervisor.
///
/// The delay is flat: no growth, no jitter, no attempt limit.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between a failure and the next connection attempt.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: RECONNECT_DELAY,
        }
    }
}
