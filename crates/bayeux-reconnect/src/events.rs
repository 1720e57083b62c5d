use crate::state::Status;
use bayeux_reconnect_core::HandshakeFailure;
use bayeux_reconnect_core::events::BusEvent;
use std::time::{Duration, Instant};

/// Events emitted by the reconnection engine.
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// A handshake request is about to be sent.
    HandshakeAttempted {
        client_name: String,
        timestamp: Instant,
        /// 1-based attempt number within the current session.
        attempt: u64,
        /// Backoff period that preceded this attempt.
        backoff: Duration,
    },
    /// The handshake succeeded and the backoff was reset.
    HandshakeSucceeded {
        client_name: String,
        timestamp: Instant,
        /// Consecutive failures that preceded this success.
        failures: u32,
        client_id: Option<String>,
    },
    /// A handshake or connect failed, or a cycle was interrupted by a
    /// disconnect.
    Unsuccessful {
        client_name: String,
        timestamp: Instant,
        failure: HandshakeFailure,
        /// Backoff period after recording the failure.
        backoff: Duration,
    },
    /// A retry was scheduled after a failure.
    RetryScheduled {
        client_name: String,
        timestamp: Instant,
        delay: Duration,
    },
    /// The client finished disconnecting.
    DisconnectConfirmed {
        client_name: String,
        timestamp: Instant,
    },
    /// The lifecycle status changed.
    StateTransition {
        client_name: String,
        timestamp: Instant,
        from: Status,
        to: Status,
    },
}

impl BusEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::HandshakeAttempted { .. } => "HandshakeAttempted",
            ReconnectEvent::HandshakeSucceeded { .. } => "HandshakeSucceeded",
            ReconnectEvent::Unsuccessful { .. } => "Unsuccessful",
            ReconnectEvent::RetryScheduled { .. } => "RetryScheduled",
            ReconnectEvent::DisconnectConfirmed { .. } => "DisconnectConfirmed",
            ReconnectEvent::StateTransition { .. } => "StateTransition",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::HandshakeAttempted { timestamp, .. }
            | ReconnectEvent::HandshakeSucceeded { timestamp, .. }
            | ReconnectEvent::Unsuccessful { timestamp, .. }
            | ReconnectEvent::RetryScheduled { timestamp, .. }
            | ReconnectEvent::DisconnectConfirmed { timestamp, .. }
            | ReconnectEvent::StateTransition { timestamp, .. } => *timestamp,
        }
    }

    fn client_name(&self) -> &str {
        match self {
            ReconnectEvent::HandshakeAttempted { client_name, .. }
            | ReconnectEvent::HandshakeSucceeded { client_name, .. }
            | ReconnectEvent::Unsuccessful { client_name, .. }
            | ReconnectEvent::RetryScheduled { client_name, .. }
            | ReconnectEvent::DisconnectConfirmed { client_name, .. }
            | ReconnectEvent::StateTransition { client_name, .. } => client_name,
        }
    }
}
