//! The reconnection engine.
//!
//! [`ReconnectEngine`] owns the client status and the backoff period. It
//! drives handshakes through the transport, reacts to their outcomes, and
//! schedules retries on a [`Timer`] until either a handshake succeeds or
//! [`ReconnectEngine::disconnect`] is called.
//!
//! All mutable state lives behind a single mutex. Every handshake attempt and
//! every scheduled retry carries a token; an outcome or a retry whose token is
//! no longer current (because a disconnect happened in between) is dropped.
//! Listeners are invoked after the lock is released, in the order the events
//! were produced, so a listener may call back into the engine. The retry
//! timer is armed outside the lock as well, since a [`Timer`] may run a
//! due callback before `schedule` returns.

use crate::config::ReconnectConfig;
use crate::events::ReconnectEvent;
use crate::policy::LinearBackoff;
use crate::state::{Lifecycle, LifecycleInput, Status};
use crate::timer::{ScheduledTask, Timer, TokioTimer};
use crate::transport::{HandshakeOutcome, HandshakeReply, HandshakeRequest, perform_handshake};
use bayeux_reconnect_core::HandshakeFailure;
use bayeux_reconnect_core::events::{EventListener, EventListeners, FnListener, ListenerId};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tower::{BoxError, Service};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

/// Point-in-time view of the engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Current status.
    pub status: Status,
    /// How long the current status has been held.
    pub time_in_status: Duration,
    /// Current backoff period.
    pub backoff: Duration,
    /// Failures since the last success or disconnect.
    pub consecutive_failures: u32,
    /// Handshake attempts made in the current session.
    pub attempts: u64,
    /// Whether a retry is scheduled.
    pub retry_pending: bool,
    /// Client id from the last successful handshake.
    pub client_id: Option<String>,
}

/// Reconnection engine for a single Bayeux client.
///
/// Cloning is cheap and every clone drives the same client.
///
/// The engine spawns transport calls and retry timers on tokio, so its
/// methods must be called from within a tokio runtime.
pub struct ReconnectEngine<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ReconnectEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    name: String,
    policy: LinearBackoff,
    transport: Mutex<S>,
    timer: Arc<dyn Timer>,
    shared: Mutex<Shared>,
    listeners: RwLock<EventListeners<ReconnectEvent>>,
}

struct Shared {
    lifecycle: Lifecycle,
    backoff: Duration,
    consecutive_failures: u32,
    attempts: u64,
    client_id: Option<String>,
    next_token: u64,
    in_flight: Option<u64>,
    pending_retry: Option<PendingRetry>,
}

/// A retry that is due. `task` is empty until the timer has been armed.
struct PendingRetry {
    token: u64,
    task: Option<Box<dyn ScheduledTask>>,
}

impl Shared {
    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn cancel_retry(&mut self) {
        if let Some(PendingRetry {
            task: Some(task), ..
        }) = self.pending_retry.take()
        {
            task.cancel();
        }
    }
}

impl<S> Drop for Inner<S> {
    fn drop(&mut self) {
        self.shared.get_mut().cancel_retry();
    }
}

impl<S> ReconnectEngine<S>
where
    S: Service<HandshakeRequest, Response = HandshakeReply> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    /// Creates an engine that handshakes through `transport` and schedules
    /// retries with a [`TokioTimer`].
    pub fn new(config: ReconnectConfig, transport: S) -> Self {
        Self::with_timer(config, transport, TokioTimer::new())
    }

    /// Creates an engine with a custom [`Timer`].
    pub fn with_timer<T: Timer>(config: ReconnectConfig, transport: S, timer: T) -> Self {
        #[cfg(feature = "metrics")]
        {
            describe_counter!(
                "bayeux_handshake_attempts_total",
                "Total number of handshake attempts (initial and retries)"
            );
            describe_counter!(
                "bayeux_handshake_failures_total",
                "Total number of failed handshake or connect attempts, by failure kind"
            );
            describe_counter!(
                "bayeux_disconnects_total",
                "Total number of completed disconnects"
            );
            describe_gauge!(
                "bayeux_backoff_period_ms",
                "Current backoff period in milliseconds"
            );
        }

        let ReconnectConfig {
            policy,
            name,
            event_listeners,
        } = config;

        Self {
            inner: Arc::new(Inner {
                name,
                policy,
                transport: Mutex::new(transport),
                timer: Arc::new(timer),
                shared: Mutex::new(Shared {
                    lifecycle: Lifecycle::new(),
                    backoff: Duration::ZERO,
                    consecutive_failures: 0,
                    attempts: 0,
                    client_id: None,
                    next_token: 0,
                    in_flight: None,
                    pending_retry: None,
                }),
                listeners: RwLock::new(event_listeners),
            }),
        }
    }

    /// Starts a handshake if the client is disconnected.
    ///
    /// Returns `false` without doing anything when a handshake is already in
    /// progress or the session is established. Failures are never reported
    /// here; they surface as [`ReconnectEvent::Unsuccessful`] events.
    pub fn handshake(&self) -> bool {
        let mut events = Vec::new();
        let request = {
            let mut shared = self.inner.shared.lock();
            let status = shared.lifecycle.status();
            if status != Status::Disconnected {
                #[cfg(feature = "tracing")]
                debug!(client = %self.inner.name, %status, "Handshake ignored, client is busy");
                return false;
            }
            match self.begin_attempt(&mut shared, LifecycleInput::BeginHandshake, &mut events) {
                Some(request) => request,
                None => return false,
            }
        };

        self.dispatch(events);
        self.spawn_attempt(request);
        true
    }

    /// Reports the outcome of the outstanding handshake.
    ///
    /// The engine already reports outcomes of the attempts it spawns. This
    /// entry point is for transports that learn the outcome out of band.
    /// Returns `false` when no handshake is outstanding.
    pub fn on_handshake_outcome(&self, outcome: HandshakeOutcome) -> bool {
        let token = match self.inner.shared.lock().in_flight {
            Some(token) => token,
            None => return false,
        };
        self.complete_attempt(token, outcome)
    }

    /// Reports that a request on the established session failed.
    ///
    /// Moves the client from connected to unsuccessful and schedules a
    /// re-handshake after the next backoff period. Returns `false` when the
    /// client is not connected.
    pub fn on_connect_failure(&self, failure: HandshakeFailure) -> bool {
        let mut events = Vec::new();
        let retry = {
            let mut shared = self.inner.shared.lock();
            if shared.lifecycle.status() != Status::Connected {
                return false;
            }
            self.record_failure(&mut shared, failure, LifecycleInput::ConnectFailed, &mut events)
        };
        self.dispatch(events);
        if let Some((token, delay)) = retry {
            self.arm_retry(token, delay);
        }
        true
    }

    /// Disconnects the client and stops all automatic retries.
    ///
    /// Any pending retry is cancelled before the status changes. If a
    /// handshake cycle was outstanding, one final
    /// [`ReconnectEvent::Unsuccessful`] carrying
    /// [`HandshakeFailure::Interrupted`] is emitted, followed by
    /// [`ReconnectEvent::DisconnectConfirmed`]. Returns `false` if the client
    /// was already disconnected or disconnecting.
    pub fn disconnect(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut shared = self.inner.shared.lock();
            let status = shared.lifecycle.status();
            if matches!(status, Status::Disconnected | Status::Disconnecting) {
                return false;
            }

            shared.cancel_retry();
            shared.in_flight = None;

            if !self.transition(&mut shared, LifecycleInput::DisconnectRequested, &mut events) {
                return false;
            }

            if status.is_cycle_in_flight() {
                events.push(ReconnectEvent::Unsuccessful {
                    client_name: self.inner.name.clone(),
                    timestamp: Instant::now(),
                    failure: HandshakeFailure::Interrupted,
                    backoff: shared.backoff,
                });
            }

            #[cfg(feature = "tracing")]
            info!(
                client = %self.inner.name,
                from = %status,
                interrupted = status.is_cycle_in_flight(),
                "Disconnecting"
            );
        }
        self.dispatch(events);

        let mut events = Vec::new();
        {
            let mut shared = self.inner.shared.lock();
            if !self.transition(&mut shared, LifecycleInput::DisconnectCompleted, &mut events) {
                return false;
            }
            shared.backoff = Duration::ZERO;
            shared.consecutive_failures = 0;
            shared.attempts = 0;
            shared.client_id = None;

            #[cfg(feature = "metrics")]
            {
                counter!("bayeux_disconnects_total", "client" => self.inner.name.clone())
                    .increment(1);
                gauge!("bayeux_backoff_period_ms", "client" => self.inner.name.clone()).set(0.0);
            }

            events.push(ReconnectEvent::DisconnectConfirmed {
                client_name: self.inner.name.clone(),
                timestamp: Instant::now(),
            });
        }
        self.dispatch(events);
        true
    }
}

impl<S> ReconnectEngine<S> {
    /// Returns the current backoff period.
    pub fn backoff_period(&self) -> Duration {
        self.inner.shared.lock().backoff
    }

    /// Returns the configured backoff increment.
    pub fn backoff_increment(&self) -> Duration {
        self.inner.policy.increment()
    }

    /// Returns the current status.
    pub fn status(&self) -> Status {
        self.inner.shared.lock().lifecycle.status()
    }

    /// Returns `true` when the client is disconnected.
    pub fn is_disconnected(&self) -> bool {
        self.status() == Status::Disconnected
    }

    /// Returns the client name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns a consistent view of the engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        let shared = self.inner.shared.lock();
        EngineSnapshot {
            status: shared.lifecycle.status(),
            time_in_status: shared.lifecycle.time_in_status(),
            backoff: shared.backoff,
            consecutive_failures: shared.consecutive_failures,
            attempts: shared.attempts,
            retry_pending: shared.pending_retry.is_some(),
            client_id: shared.client_id.clone(),
        }
    }

    /// Registers a listener for every engine event.
    pub fn add_listener<L>(&self, listener: L) -> ListenerId
    where
        L: EventListener<ReconnectEvent> + 'static,
    {
        self.inner.listeners.write().add(listener)
    }

    /// Registers a closure for every engine event.
    pub fn subscribe<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&ReconnectEvent) + Send + Sync + 'static,
    {
        self.add_listener(FnListener::new(f))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.write().remove(id)
    }

    fn dispatch(&self, events: Vec<ReconnectEvent>) {
        if events.is_empty() {
            return;
        }
        let listeners = self.inner.listeners.read().clone();
        for event in &events {
            listeners.emit(event);
        }
    }

    fn transition(
        &self,
        shared: &mut Shared,
        input: LifecycleInput,
        events: &mut Vec<ReconnectEvent>,
    ) -> bool {
        match shared.lifecycle.apply(input) {
            Ok(transition) => {
                events.push(ReconnectEvent::StateTransition {
                    client_name: self.inner.name.clone(),
                    timestamp: Instant::now(),
                    from: transition.from,
                    to: transition.to,
                });
                true
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                warn!(client = %self.inner.name, error = %_err, "Ignoring lifecycle input");
                false
            }
        }
    }

    fn begin_attempt(
        &self,
        shared: &mut Shared,
        input: LifecycleInput,
        events: &mut Vec<ReconnectEvent>,
    ) -> Option<(u64, HandshakeRequest)> {
        if !self.transition(shared, input, events) {
            return None;
        }

        let token = shared.token();
        shared.in_flight = Some(token);
        shared.attempts += 1;

        let request = HandshakeRequest {
            attempt: shared.attempts,
            backoff: shared.backoff,
        };

        #[cfg(feature = "tracing")]
        debug!(
            client = %self.inner.name,
            attempt = request.attempt,
            backoff_ms = request.backoff.as_millis() as u64,
            "Attempting handshake"
        );

        #[cfg(feature = "metrics")]
        counter!("bayeux_handshake_attempts_total", "client" => self.inner.name.clone())
            .increment(1);

        events.push(ReconnectEvent::HandshakeAttempted {
            client_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            attempt: request.attempt,
            backoff: request.backoff,
        });

        Some((token, request))
    }

    fn record_success(
        &self,
        shared: &mut Shared,
        reply: HandshakeReply,
        events: &mut Vec<ReconnectEvent>,
    ) {
        if !self.transition(shared, LifecycleInput::HandshakeSucceeded, events) {
            return;
        }

        let failures = shared.consecutive_failures;
        shared.backoff = Duration::ZERO;
        shared.consecutive_failures = 0;
        shared.client_id = reply.client_id.clone();

        #[cfg(feature = "tracing")]
        info!(
            client = %self.inner.name,
            client_id = ?reply.client_id,
            failures,
            "Handshake succeeded"
        );

        #[cfg(feature = "metrics")]
        gauge!("bayeux_backoff_period_ms", "client" => self.inner.name.clone()).set(0.0);

        events.push(ReconnectEvent::HandshakeSucceeded {
            client_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            failures,
            client_id: reply.client_id,
        });
    }
}

impl<S> ReconnectEngine<S>
where
    S: Service<HandshakeRequest, Response = HandshakeReply> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    fn record_failure(
        &self,
        shared: &mut Shared,
        failure: HandshakeFailure,
        input: LifecycleInput,
        events: &mut Vec<ReconnectEvent>,
    ) -> Option<(u64, Duration)> {
        if !self.transition(shared, input, events) {
            return None;
        }

        shared.backoff = self.inner.policy.next_period(shared.backoff);
        shared.consecutive_failures = shared.consecutive_failures.saturating_add(1);
        let delay = shared.backoff;

        #[cfg(feature = "tracing")]
        warn!(
            client = %self.inner.name,
            error = %failure,
            kind = failure.kind(),
            backoff_ms = delay.as_millis() as u64,
            "Handshake unsuccessful, retrying after backoff"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "bayeux_handshake_failures_total",
                "client" => self.inner.name.clone(),
                "kind" => failure.kind()
            )
            .increment(1);
            gauge!("bayeux_backoff_period_ms", "client" => self.inner.name.clone())
                .set(delay.as_millis() as f64);
        }

        events.push(ReconnectEvent::Unsuccessful {
            client_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            failure,
            backoff: delay,
        });

        shared.cancel_retry();
        let token = shared.token();
        shared.pending_retry = Some(PendingRetry { token, task: None });
        events.push(ReconnectEvent::RetryScheduled {
            client_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            delay,
        });

        Some((token, delay))
    }

    /// Hands the retry reserved under `token` to the timer.
    ///
    /// Must be called without holding the state lock.
    fn arm_retry(&self, token: u64, delay: Duration) {
        if !self.retry_is_current(token) {
            return;
        }

        let weak: Weak<Inner<S>> = Arc::downgrade(&self.inner);
        let task = self.inner.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    ReconnectEngine { inner }.fire_retry(token);
                }
            }),
        );

        let mut shared = self.inner.shared.lock();
        match &mut shared.pending_retry {
            Some(pending) if pending.token == token => pending.task = Some(task),
            // Fired inline or superseded by a disconnect while unlocked.
            _ => task.cancel(),
        }
    }

    fn retry_is_current(&self, token: u64) -> bool {
        matches!(&self.inner.shared.lock().pending_retry, Some(pending) if pending.token == token)
    }

    fn fire_retry(&self, token: u64) {
        let mut events = Vec::new();
        let request = {
            let mut shared = self.inner.shared.lock();
            match &shared.pending_retry {
                Some(pending) if pending.token == token => {}
                _ => return,
            }
            // The task is finishing on its own, so it is dropped rather than
            // cancelled.
            shared.pending_retry = None;

            if shared.lifecycle.status() != Status::Unsuccessful {
                return;
            }
            match self.begin_attempt(&mut shared, LifecycleInput::RetryFired, &mut events) {
                Some(request) => request,
                None => return,
            }
        };

        self.dispatch(events);
        self.spawn_attempt(request);
    }

    fn spawn_attempt(&self, (token, request): (u64, HandshakeRequest)) {
        let service = self.inner.transport.lock().clone();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let outcome = perform_handshake(service, request).await;
            if let Some(inner) = weak.upgrade() {
                ReconnectEngine { inner }.complete_attempt(token, outcome);
            }
        });
    }

    fn complete_attempt(&self, token: u64, outcome: HandshakeOutcome) -> bool {
        let mut events = Vec::new();
        let retry = {
            let mut shared = self.inner.shared.lock();
            if shared.in_flight != Some(token) {
                #[cfg(feature = "tracing")]
                debug!(client = %self.inner.name, "Discarding stale handshake outcome");
                return false;
            }
            shared.in_flight = None;

            match outcome {
                Ok(reply) => {
                    self.record_success(&mut shared, reply, &mut events);
                    None
                }
                Err(failure) => self.record_failure(
                    &mut shared,
                    failure,
                    LifecycleInput::HandshakeFailed,
                    &mut events,
                ),
            }
        };
        self.dispatch(events);
        if let Some((token, delay)) = retry {
            self.arm_retry(token, delay);
        }
        true
    }
}

impl<S> std::fmt::Debug for ReconnectEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("ReconnectEngine")
            .field("name", &self.inner.name)
            .field("status", &shared.lifecycle.status())
            .field("backoff", &shared.backoff)
            .finish()
    }
}
