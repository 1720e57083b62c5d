//! Client lifecycle state machine.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Lifecycle status of a Bayeux client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Status {
    /// No session; the only state reachable through an explicit disconnect.
    Disconnected,

    /// A handshake attempt is outstanding.
    Handshaking,

    /// The handshake succeeded and the session is established.
    Connected,

    /// The last handshake or connect failed; a retry is pending.
    Unsuccessful,

    /// A disconnect was requested and is being completed.
    Disconnecting,
}

impl Status {
    /// Returns the canonical lowercase name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Disconnected => "disconnected",
            Status::Handshaking => "handshaking",
            Status::Connected => "connected",
            Status::Unsuccessful => "unsuccessful",
            Status::Disconnecting => "disconnecting",
        }
    }

    /// Returns `true` while a handshake cycle is outstanding, either as an
    /// in-flight attempt or as a pending retry.
    pub fn is_cycle_in_flight(&self) -> bool {
        matches!(self, Status::Handshaking | Status::Unsuccessful)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown client status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnected" => Ok(Status::Disconnected),
            "handshaking" => Ok(Status::Handshaking),
            "connected" => Ok(Status::Connected),
            "unsuccessful" => Ok(Status::Unsuccessful),
            "disconnecting" => Ok(Status::Disconnecting),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Protocol events that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    /// An explicit `handshake()` call.
    BeginHandshake,
    /// A scheduled retry fired.
    RetryFired,
    /// The outstanding handshake succeeded.
    HandshakeSucceeded,
    /// The outstanding handshake failed.
    HandshakeFailed,
    /// A request on an established session failed.
    ConnectFailed,
    /// `disconnect()` was called.
    DisconnectRequested,
    /// The disconnect finished.
    DisconnectCompleted,
}

/// A rejected (status, input) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {input:?} while {from}")]
pub struct InvalidTransition {
    /// Status at the time of the input.
    pub from: Status,
    /// The rejected input.
    pub input: LifecycleInput,
}

/// A status change applied by [`Lifecycle::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status before the input.
    pub from: Status,
    /// Status after the input.
    pub to: Status,
}

/// Holds the current status and applies transitions.
///
/// Invalid inputs are rejected and leave the status unchanged.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    status: Status,
    last_change: Instant,
}

impl Lifecycle {
    /// Creates a lifecycle in [`Status::Disconnected`].
    pub fn new() -> Self {
        Self {
            status: Status::Disconnected,
            last_change: Instant::now(),
        }
    }

    /// Returns the current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns how long the current status has been held.
    pub fn time_in_status(&self) -> Duration {
        self.last_change.elapsed()
    }

    /// Returns the status `input` leads to from `from`, if the pair is valid.
    pub fn target(from: Status, input: LifecycleInput) -> Option<Status> {
        use LifecycleInput::*;
        use Status::*;

        match (from, input) {
            (Disconnected, BeginHandshake) => Some(Handshaking),
            (Unsuccessful, RetryFired) => Some(Handshaking),
            (Handshaking, HandshakeSucceeded) => Some(Connected),
            (Handshaking, HandshakeFailed) => Some(Unsuccessful),
            (Connected, ConnectFailed) => Some(Unsuccessful),
            (Handshaking | Connected | Unsuccessful, DisconnectRequested) => Some(Disconnecting),
            (Disconnecting, DisconnectCompleted) => Some(Disconnected),
            _ => None,
        }
    }

    /// Applies `input`, returning the transition that took place.
    pub fn apply(&mut self, input: LifecycleInput) -> Result<Transition, InvalidTransition> {
        let from = self.status;
        let to = Self::target(from, input).ok_or(InvalidTransition { from, input })?;
        self.status = to;
        self.last_change = Instant::now();
        Ok(Transition { from, to })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
