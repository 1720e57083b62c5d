//! Boundary between the engine and the transport that performs handshakes.
//!
//! Any [`tower::Service`] accepting a [`HandshakeRequest`] and answering with
//! a [`HandshakeReply`] can act as the transport. Whatever goes wrong on the
//! other side of the boundary (an I/O error, a reply with
//! `successful: false`, or a panic raised while the server processes the
//! handshake) is turned into a [`HandshakeFailure`] here, so the engine only
//! ever sees a `Result`.

use bayeux_reconnect_core::HandshakeFailure;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tower::{BoxError, Service, ServiceExt};

/// A handshake request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// 1-based attempt number within the current session.
    pub attempt: u64,
    /// Backoff period that preceded this attempt.
    pub backoff: Duration,
}

/// The server's answer to a handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeReply {
    /// Whether the server accepted the handshake.
    pub successful: bool,
    /// Session id assigned by the server.
    pub client_id: Option<String>,
    /// Error string when `successful` is false.
    pub error: Option<String>,
}

impl HandshakeReply {
    /// A successful reply carrying the assigned client id.
    pub fn accepted<S: Into<String>>(client_id: S) -> Self {
        Self {
            successful: true,
            client_id: Some(client_id.into()),
            error: None,
        }
    }

    /// An unsuccessful reply carrying the server's error string.
    pub fn denied<S: Into<String>>(error: S) -> Self {
        Self {
            successful: false,
            client_id: None,
            error: Some(error.into()),
        }
    }
}

/// Result of a handshake or connect attempt as seen by the engine.
pub type HandshakeOutcome = Result<HandshakeReply, HandshakeFailure>;

/// Sends `request` through `service` and normalises every failure mode into
/// a [`HandshakeFailure`].
pub async fn perform_handshake<S>(service: S, request: HandshakeRequest) -> HandshakeOutcome
where
    S: Service<HandshakeRequest, Response = HandshakeReply>,
    S::Error: Into<BoxError>,
{
    match AssertUnwindSafe(service.oneshot(request))
        .catch_unwind()
        .await
    {
        Ok(Ok(reply)) => classify_reply(reply),
        Ok(Err(error)) => {
            let error: BoxError = error.into();
            Err(HandshakeFailure::Transport {
                message: error.to_string(),
            })
        }
        Err(payload) => Err(HandshakeFailure::server_fault(panic_message(&payload))),
    }
}

/// Maps a reply to an outcome; an unsuccessful reply is a rejection.
pub fn classify_reply(reply: HandshakeReply) -> HandshakeOutcome {
    if reply.successful {
        Ok(reply)
    } else {
        let reason = reply
            .error
            .unwrap_or_else(|| "handshake denied".to_string());
        Err(HandshakeFailure::rejected(reason))
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "server raised an exception while processing the handshake".to_string()
    }
}
