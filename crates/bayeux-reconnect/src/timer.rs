//! Delayed, cancellable callbacks.
//!
//! The engine only ever needs one outstanding callback at a time: the next
//! handshake retry. [`Timer`] abstracts where that callback runs so tests and
//! embedders can substitute their own scheduler. [`TokioTimer`] is the default
//! and honours tokio's paused clock, which keeps timing tests deterministic.

use std::fmt;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A callback handed to a [`Timer`].
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a callback scheduled on a [`Timer`].
pub trait ScheduledTask: Send + Sync + fmt::Debug {
    /// Prevents the callback from running if it has not started yet.
    fn cancel(&self);

    /// Returns `true` once the callback ran or was cancelled.
    fn is_finished(&self) -> bool;
}

/// Schedules a single delayed callback.
pub trait Timer: Send + Sync + 'static {
    /// Runs `task` once `delay` has elapsed.
    ///
    /// A task that is already due may run before `schedule` returns.
    fn schedule(&self, delay: Duration, task: TimerTask) -> Box<dyn ScheduledTask>;
}

/// [`Timer`] backed by tokio tasks.
#[derive(Debug, Clone, Default)]
pub struct TokioTimer {
    handle: Option<Handle>,
}

impl TokioTimer {
    /// Creates a timer that spawns on the runtime current at scheduling time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a timer that always spawns on `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Box<dyn ScheduledTask> {
        let fut = async move {
            tokio::time::sleep(delay).await;
            task();
        };
        let join = match &self.handle {
            Some(handle) => handle.spawn(fut),
            None => tokio::spawn(fut),
        };
        Box::new(TokioScheduledTask { join })
    }
}

#[derive(Debug)]
struct TokioScheduledTask {
    join: JoinHandle<()>,
}

impl ScheduledTask for TokioScheduledTask {
    fn cancel(&self) {
        self.join.abort();
    }

    fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
