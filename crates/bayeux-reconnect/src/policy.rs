//! Linear backoff policy for handshake retries.
//!
//! The backoff period grows by a fixed increment per consecutive failure and
//! drops back to zero on success or disconnect. Growth is additive only, with
//! no multiplier or jitter, so retry timing stays predictable.

use std::time::Duration;

/// Computes the next backoff period: `current + increment`.
///
/// Saturates at [`Duration::MAX`] instead of overflowing.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bayeux_reconnect::next_delay;
///
/// let period = next_delay(Duration::from_millis(1000), Duration::from_millis(1000));
/// assert_eq!(period, Duration::from_millis(2000));
/// ```
pub fn next_delay(current: Duration, increment: Duration) -> Duration {
    current.saturating_add(increment)
}

/// Linear backoff with an optional ceiling.
///
/// The period only grows while it is below the ceiling, so the last step may
/// land on or slightly above it, and it then stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    increment: Duration,
    max_backoff: Option<Duration>,
}

impl LinearBackoff {
    /// Creates an unbounded linear backoff.
    ///
    /// An increment of zero is allowed and makes every retry immediate.
    pub fn new(increment: Duration) -> Self {
        Self {
            increment,
            max_backoff: None,
        }
    }

    /// Caps growth at `max_backoff`.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    /// Removes the ceiling.
    pub fn unbounded(mut self) -> Self {
        self.max_backoff = None;
        self
    }

    /// Returns the fixed step added per failure.
    pub fn increment(&self) -> Duration {
        self.increment
    }

    /// Returns the ceiling, if any.
    pub fn ceiling(&self) -> Option<Duration> {
        self.max_backoff
    }

    /// Returns the period that follows `current` after one more failure.
    pub fn next_period(&self, current: Duration) -> Duration {
        match self.max_backoff {
            Some(max) if current >= max => current,
            _ => next_delay(current, self.increment),
        }
    }

    /// Returns the period reached after `failures` consecutive failures
    /// starting from zero.
    pub fn period_after(&self, failures: u32) -> Duration {
        let mut period = Duration::ZERO;
        for _ in 0..failures {
            let next = self.next_period(period);
            if next == period {
                break;
            }
            period = next;
        }
        period
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}
