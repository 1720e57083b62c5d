//! Common error types for the Bayeux reconnection stack.
//!
//! A handshake can fail for several reasons, but the reconnection engine
//! treats all of them the same way: the failure is recorded, the backoff grows
//! by one increment and a retry is scheduled. [`HandshakeFailure`] keeps the
//! reason around for listeners and logs without letting it influence the
//! retry cadence.
//!
//! # Classifying failures
//!
//! ```rust
//! use bayeux_reconnect_core::HandshakeFailure;
//!
//! let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
//! let failure = HandshakeFailure::transport(&io);
//! assert!(failure.is_transport());
//! assert!(!failure.is_server_side());
//!
//! let fault = HandshakeFailure::server_fault("explicitly_thrown_by_test");
//! assert!(fault.is_server_side());
//! ```

use std::time::Duration;

/// Reason a handshake or connect attempt did not succeed.
///
/// Every variant is recovered locally by the reconnection engine; none of them
/// is ever returned to the caller of `handshake()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeFailure {
    /// The request never completed at the network level.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the underlying I/O or transport error.
        message: String,
    },

    /// The server answered but denied the handshake.
    #[error("handshake rejected by server: {reason}")]
    Rejected {
        /// Error string carried by the server reply.
        reason: String,
    },

    /// Server-side processing raised an exception (for example an extension
    /// hook failing while handling `/meta/handshake`).
    #[error("server fault during handshake: {message}")]
    ServerFault {
        /// Message extracted from the fault.
        message: String,
    },

    /// The cycle was cut short by an explicit disconnect.
    #[error("handshake interrupted by disconnect")]
    Interrupted,
}

impl HandshakeFailure {
    /// Builds a [`HandshakeFailure::Transport`] from any error.
    pub fn transport(error: &(dyn std::error::Error + 'static)) -> Self {
        HandshakeFailure::Transport {
            message: error.to_string(),
        }
    }

    /// Builds a [`HandshakeFailure::Rejected`] with the given reason.
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        HandshakeFailure::Rejected {
            reason: reason.into(),
        }
    }

    /// Builds a [`HandshakeFailure::ServerFault`] with the given message.
    pub fn server_fault<S: Into<String>>(message: S) -> Self {
        HandshakeFailure::ServerFault {
            message: message.into(),
        }
    }

    /// Returns `true` for network-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, HandshakeFailure::Transport { .. })
    }

    /// Returns `true` when the server rejected the handshake or faulted
    /// while processing it.
    pub fn is_server_side(&self) -> bool {
        matches!(
            self,
            HandshakeFailure::Rejected { .. } | HandshakeFailure::ServerFault { .. }
        )
    }

    /// Returns `true` for the failure synthesised by a disconnect.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, HandshakeFailure::Interrupted)
    }

    /// Short label used for metric labels and structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            HandshakeFailure::Transport { .. } => "transport",
            HandshakeFailure::Rejected { .. } => "rejected",
            HandshakeFailure::ServerFault { .. } => "server_fault",
            HandshakeFailure::Interrupted => "interrupted",
        }
    }
}

/// Errors raised while validating a client configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The backoff ceiling is smaller than a single increment, so the
    /// period could never grow.
    #[error("max backoff ({max_backoff:?}) is smaller than the backoff increment ({increment:?})")]
    MaxBackoffBelowIncrement {
        /// Configured ceiling.
        max_backoff: Duration,
        /// Configured increment.
        increment: Duration,
    },

    /// The client name was empty.
    #[error("client name must not be empty")]
    EmptyName,
}
