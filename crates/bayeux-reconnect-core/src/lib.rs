//! Core infrastructure for bayeux-reconnect.
//!
//! This crate provides the pieces shared by the reconnection engine and its
//! collaborators:
//! - Typed event system with removable listeners
//! - Failure taxonomy for handshake and connect attempts
//! - Configuration errors

pub mod error;
pub mod events;

pub use error::{ConfigError, HandshakeFailure};
pub use events::{BusEvent, EventListener, EventListeners, FnListener, ListenerId};
