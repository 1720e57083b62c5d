use super::helpers::*;
use bayeux_reconnect::{ReconnectConfig, ReconnectEngine, ScheduledTask, Status, Timer, TimerTask};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timer that holds callbacks until the test fires them.
#[derive(Clone, Default)]
struct ManualTimer {
    queue: Arc<Mutex<Vec<(Duration, TimerTask, Arc<AtomicBool>)>>>,
}

#[derive(Debug)]
struct ManualTask {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask for ManualTask {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Box<dyn ScheduledTask> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.queue
            .lock()
            .unwrap()
            .push((delay, task, Arc::clone(&cancelled)));
        Box::new(ManualTask { cancelled })
    }
}

impl ManualTimer {
    fn delays(&self) -> Vec<Duration> {
        self.queue.lock().unwrap().iter().map(|(d, _, _)| *d).collect()
    }

    /// Runs the oldest callback, even if it was cancelled.
    fn fire_next(&self) -> bool {
        let entry = {
            let mut queue = self.queue.lock().unwrap();
            if queue.is_empty() {
                return false;
            }
            queue.remove(0)
        };
        let (_, task, _) = entry;
        task();
        true
    }
}

/// Timer that runs due callbacks on the caller's stack.
#[derive(Clone, Default)]
struct InlineTimer {
    deferred: ManualTimer,
}

#[derive(Debug)]
struct CompletedTask;

impl ScheduledTask for CompletedTask {
    fn cancel(&self) {}

    fn is_finished(&self) -> bool {
        true
    }
}

impl Timer for InlineTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Box<dyn ScheduledTask> {
        if delay.is_zero() {
            task();
            Box::new(CompletedTask)
        } else {
            self.deferred.schedule(delay, task)
        }
    }
}

fn config() -> ReconnectConfig {
    ReconnectConfig::builder()
        .backoff_increment(Duration::from_secs(3))
        .name("manual")
        .build()
}

#[tokio::test]
async fn retries_are_scheduled_with_current_backoff() {
    let timer = ManualTimer::default();
    let engine =
        ReconnectEngine::with_timer(config(), FlakyTransport::always_failing(), timer.clone());

    engine.handshake();
    settle().await;
    assert!(timer.fire_next());
    settle().await;

    assert_eq!(
        timer.delays(),
        vec![Duration::from_secs(6)],
        "first retry consumed, second pending"
    );
    assert_eq!(engine.snapshot().attempts, 2);
}

#[tokio::test]
async fn cancelled_retry_that_still_fires_is_ignored() {
    let timer = ManualTimer::default();
    let transport = FlakyTransport::always_failing();
    let engine = ReconnectEngine::with_timer(config(), transport.clone(), timer.clone());

    engine.handshake();
    settle().await;
    engine.disconnect();

    // Simulates a timer that could not stop a callback already in motion.
    assert!(timer.fire_next());
    settle().await;

    assert_eq!(engine.status(), Status::Disconnected);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn stale_retry_from_previous_session_is_ignored() {
    let timer = ManualTimer::default();
    let transport = FlakyTransport::new(1);
    let engine = ReconnectEngine::with_timer(config(), transport.clone(), timer.clone());

    engine.handshake();
    settle().await;
    engine.disconnect();

    engine.handshake();
    settle().await;
    assert_eq!(engine.status(), Status::Connected);

    assert!(timer.fire_next());
    settle().await;
    assert_eq!(engine.status(), Status::Connected);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn timer_running_due_retry_inline() {
    let config = ReconnectConfig::builder()
        .backoff_increment(Duration::ZERO)
        .name("inline")
        .build();
    let transport = FlakyTransport::new(3);
    let engine = ReconnectEngine::with_timer(config, transport.clone(), InlineTimer::default());
    let log = EventLog::attach(&engine);

    assert!(engine.handshake());
    for _ in 0..100 {
        if engine.status() == Status::Connected {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(engine.status(), Status::Connected);
    assert_eq!(transport.calls(), 4);
    assert_eq!(log.unsuccessful(), 3);
    assert_eq!(log.attempts(), 4);
    assert!(!engine.snapshot().retry_pending);
}

#[tokio::test]
async fn disconnect_from_listener_stops_inline_retry() {
    let config = ReconnectConfig::builder()
        .backoff_increment(Duration::ZERO)
        .name("inline")
        .build();
    let transport = FlakyTransport::always_failing();
    let engine = ReconnectEngine::with_timer(config, transport.clone(), InlineTimer::default());

    let handle = engine.clone();
    engine.subscribe(move |event| {
        if let bayeux_reconnect::ReconnectEvent::RetryScheduled { .. } = event {
            handle.disconnect();
        }
    });

    engine.handshake();
    settle().await;

    assert_eq!(engine.status(), Status::Disconnected);
    assert_eq!(transport.calls(), 1);
}
