use crate::events::ReconnectEvent;
use crate::policy::LinearBackoff;
use crate::state::Status;
use bayeux_reconnect_core::events::{EventListeners, FnListener};
use bayeux_reconnect_core::{ConfigError, HandshakeFailure};
use std::time::Duration;

/// Configuration for the reconnection engine.
pub struct ReconnectConfig {
    /// Backoff policy applied after each failure.
    pub(crate) policy: LinearBackoff,

    /// Name used in events, log fields and metric labels.
    pub(crate) name: String,

    /// Listeners installed when the engine is built.
    pub(crate) event_listeners: EventListeners<ReconnectEvent>,
}

impl Clone for ReconnectConfig {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            name: self.name.clone(),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl std::fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("policy", &self.policy)
            .field("name", &self.name)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

impl ReconnectConfig {
    /// Creates a new builder for configuring reconnection behavior.
    pub fn builder() -> ReconnectConfigBuilder {
        ReconnectConfigBuilder::default()
    }

    /// Returns the backoff policy.
    pub fn policy(&self) -> &LinearBackoff {
        &self.policy
    }

    /// Returns the fixed step added to the backoff per failure.
    pub fn backoff_increment(&self) -> Duration {
        self.policy.increment()
    }

    /// Returns the backoff ceiling, if any.
    pub fn max_backoff(&self) -> Option<Duration> {
        self.policy.ceiling()
    }

    /// Returns the client name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfigBuilder::default().build()
    }
}

/// Builder for constructing a [`ReconnectConfig`].
pub struct ReconnectConfigBuilder {
    increment: Duration,
    max_backoff: Option<Duration>,
    name: String,
    event_listeners: EventListeners<ReconnectEvent>,
}

impl std::fmt::Debug for ReconnectConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfigBuilder")
            .field("increment", &self.increment)
            .field("max_backoff", &self.max_backoff)
            .field("name", &self.name)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Defaults:
    /// - backoff increment: 1000ms
    /// - max backoff: none (grows by one increment per failure)
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the step added to the backoff period after each failure.
    ///
    /// Zero is allowed and makes every retry immediate.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use bayeux_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .backoff_increment(Duration::from_millis(500))
    ///     .build();
    /// assert_eq!(config.backoff_increment(), Duration::from_millis(500));
    /// ```
    pub fn backoff_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    /// Stops growing the backoff period once it reaches `max_backoff`.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    /// Lets the backoff period grow without a ceiling.
    ///
    /// # Examples
    ///
    /// ```
    /// use bayeux_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .unbounded_backoff()
    ///     .build();
    /// assert_eq!(config.max_backoff(), None);
    /// ```
    pub fn unbounded_backoff(mut self) -> Self {
        self.max_backoff = None;
        self
    }

    /// Sets the name for this client (used in events, logs and metrics).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked whenever a handshake is attempted.
    ///
    /// # Callback Signature
    /// `Fn(u64)` - Called with the 1-based attempt number.
    pub fn on_handshake<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::HandshakeAttempted { attempt, .. } = event {
                f(*attempt);
            }
        }));
        self
    }

    /// Registers a callback invoked when a handshake succeeds.
    ///
    /// # Callback Signature
    /// `Fn(Option<&str>)` - Called with the client id assigned by the server.
    pub fn on_connected<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::HandshakeSucceeded { client_id, .. } = event {
                f(client_id.as_deref());
            }
        }));
        self
    }

    /// Registers a callback invoked on every failure notification, including
    /// the one synthesised when a disconnect interrupts a retry cycle.
    ///
    /// # Callback Signature
    /// `Fn(&HandshakeFailure, Duration)` - Called with the failure and the
    /// backoff period after recording it.
    ///
    /// # Example
    /// ```rust
    /// use bayeux_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .on_unsuccessful(|failure, backoff| {
    ///         println!("handshake failed ({failure}), next retry in {backoff:?}");
    ///     })
    ///     .build();
    /// ```
    pub fn on_unsuccessful<F>(mut self, f: F) -> Self
    where
        F: Fn(&HandshakeFailure, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Unsuccessful {
                failure, backoff, ..
            } = event
            {
                f(failure, *backoff);
            }
        }));
        self
    }

    /// Registers a callback invoked when a retry is scheduled.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with the delay before the retry fires.
    pub fn on_retry_scheduled<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::RetryScheduled { delay, .. } = event {
                f(*delay);
            }
        }));
        self
    }

    /// Registers a callback invoked once a disconnect completes.
    pub fn on_disconnect<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::DisconnectConfirmed { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked on every status change.
    ///
    /// # Callback Signature
    /// `Fn(Status, Status)` - Called with the old and new status.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(Status, Status) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Builds the configuration without validating it.
    pub fn build(self) -> ReconnectConfig {
        let mut policy = LinearBackoff::new(self.increment);
        if let Some(max) = self.max_backoff {
            policy = policy.max_backoff(max);
        }

        ReconnectConfig {
            policy,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MaxBackoffBelowIncrement`] when the ceiling is
    /// smaller than one increment and [`ConfigError::EmptyName`] when the
    /// name is empty.
    pub fn try_build(self) -> Result<ReconnectConfig, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if let Some(max_backoff) = self.max_backoff {
            if max_backoff < self.increment {
                return Err(ConfigError::MaxBackoffBelowIncrement {
                    max_backoff,
                    increment: self.increment,
                });
            }
        }
        Ok(self.build())
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self {
            increment: Duration::from_millis(1000),
            max_backoff: None,
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
        }
    }
}

/// Plain settings as they appear in a client `configure({...})` object.
///
/// Values are milliseconds. Missing keys fall back to the builder defaults.
///
/// ```
/// use bayeux_reconnect::ReconnectSettings;
///
/// let settings: ReconnectSettings =
///     serde_json::from_str(r#"{"backoffIncrement": 250, "maxBackoff": 5000}"#).unwrap();
/// let config = settings.into_builder().build();
/// assert_eq!(config.backoff_increment().as_millis(), 250);
/// ```
#[cfg(feature = "serde")]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Client name.
    pub name: Option<String>,
    /// Step added per failure, in milliseconds.
    pub backoff_increment: u64,
    /// Backoff ceiling in milliseconds; `None` means unbounded.
    pub max_backoff: Option<u64>,
}

#[cfg(feature = "serde")]
impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            name: None,
            backoff_increment: 1000,
            max_backoff: None,
        }
    }
}

#[cfg(feature = "serde")]
impl ReconnectSettings {
    /// Converts these settings into a builder so listeners can be added.
    pub fn into_builder(self) -> ReconnectConfigBuilder {
        let mut builder =
            ReconnectConfig::builder().backoff_increment(Duration::from_millis(self.backoff_increment));
        builder = match self.max_backoff {
            Some(max) => builder.max_backoff(Duration::from_millis(max)),
            None => builder.unbounded_backoff(),
        };
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        builder
    }
}
