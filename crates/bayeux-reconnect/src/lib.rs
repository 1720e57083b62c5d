//! Reconnection and backoff engine for Bayeux publish-subscribe clients.
//!
//! A Bayeux client starts every session with a handshake. When the handshake
//! (or a later connect on the established session) fails, this crate decides
//! when to try again: the backoff period grows by a fixed increment per
//! consecutive failure, drops back to zero on success, and an explicit
//! disconnect stops all retries for good.
//!
//! # Features
//!
//! - **Linear backoff**: predictable retry cadence with an optional ceiling
//! - **Lifecycle tracking**: `disconnected`, `handshaking`, `connected`,
//!   `unsuccessful`, `disconnecting`
//! - **Failure normalisation**: transport errors, rejected replies and
//!   server-side panics all become a [`HandshakeFailure`]
//! - **Typed events**: subscribe to [`ReconnectEvent`] instead of channel names
//! - **Cancellable retries**: a disconnect always beats a pending retry
//!
//! # Examples
//!
//! ```rust
//! use bayeux_reconnect::{HandshakeReply, HandshakeRequest, ReconnectConfig, ReconnectEngine};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = ReconnectConfig::builder()
//!     .backoff_increment(Duration::from_millis(1000))
//!     .max_backoff(Duration::from_secs(30))
//!     .name("chat")
//!     .on_unsuccessful(|failure, backoff| {
//!         println!("handshake failed: {failure}, retrying in {backoff:?}");
//!     })
//!     .build();
//!
//! let transport = tower::service_fn(|_req: HandshakeRequest| async {
//!     Ok::<_, std::io::Error>(HandshakeReply::accepted("2f8a1c"))
//! });
//!
//! let engine = ReconnectEngine::new(config, transport);
//! assert_eq!(engine.backoff_period(), Duration::ZERO);
//! engine.handshake();
//! # }
//! ```

mod config;
mod engine;
mod events;
mod policy;
mod state;
mod timer;
mod transport;

#[cfg(feature = "serde")]
pub use config::ReconnectSettings;
pub use config::{ReconnectConfig, ReconnectConfigBuilder};
pub use engine::{EngineSnapshot, ReconnectEngine};
pub use events::ReconnectEvent;
pub use policy::{LinearBackoff, next_delay};
pub use state::{InvalidTransition, Lifecycle, LifecycleInput, Status, Transition, UnknownStatus};
pub use timer::{ScheduledTask, Timer, TimerTask, TokioTimer};
pub use transport::{
    HandshakeOutcome, HandshakeReply, HandshakeRequest, classify_reply, perform_handshake,
};

pub use bayeux_reconnect_core::events::{BusEvent, EventListener, FnListener, ListenerId};
pub use bayeux_reconnect_core::{ConfigError, HandshakeFailure};
