use super::helpers::*;
use bayeux_reconnect::{
    HandshakeFailure, HandshakeReply, HandshakeRequest, ReconnectConfig, ReconnectEngine,
    ReconnectEvent, Status,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config() -> ReconnectConfig {
    ReconnectConfig::builder()
        .backoff_increment(Duration::from_millis(250))
        .name("transport")
        .build()
}

fn last_failure(log: &EventLog) -> Option<HandshakeFailure> {
    log.events().into_iter().rev().find_map(|e| match e {
        ReconnectEvent::Unsuccessful { failure, .. } => Some(failure),
        _ => None,
    })
}

#[tokio::test(start_paused = true)]
async fn server_side_panic_becomes_server_fault() {
    let transport = ThrowingTransport::new();
    let engine = ReconnectEngine::new(config(), transport.clone());
    let log = EventLog::attach(&engine);

    engine.handshake();
    settle().await;

    let failure = last_failure(&log).unwrap();
    assert!(failure.is_server_side());
    assert_eq!(failure.kind(), "server_fault");
    assert!(failure.to_string().contains("extension failed"));
    assert_eq!(engine.status(), Status::Unsuccessful);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn denied_reply_is_rejection() {
    let transport = tower::service_fn(|_req: HandshakeRequest| async {
        Ok::<_, std::io::Error>(HandshakeReply::denied("403::handshake_denied"))
    });
    let engine = ReconnectEngine::new(config(), transport);
    let log = EventLog::attach(&engine);

    engine.handshake();
    settle().await;

    assert_eq!(
        last_failure(&log),
        Some(HandshakeFailure::rejected("403::handshake_denied"))
    );
    assert_eq!(engine.backoff_period(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn service_error_is_transport_failure() {
    let engine = ReconnectEngine::new(config(), FlakyTransport::always_failing());
    let log = EventLog::attach(&engine);

    engine.handshake();
    settle().await;

    let failure = last_failure(&log).unwrap();
    assert!(failure.is_transport());
    assert!(failure.to_string().contains("connection refused"));
}

#[tokio::test(start_paused = true)]
async fn requests_carry_attempt_and_backoff() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let transport = tower::service_fn(move |req: HandshakeRequest| {
        seen_clone.lock().unwrap().push((req.attempt, req.backoff));
        async move {
            if req.attempt < 3 {
                Ok::<_, std::io::Error>(HandshakeReply::denied("busy"))
            } else {
                Ok(HandshakeReply::accepted("abc"))
            }
        }
    });
    let engine = ReconnectEngine::new(config(), transport);

    engine.handshake();
    settle().await;
    tokio::time::sleep(Duration::from_millis(251)).await;
    settle().await;
    tokio::time::sleep(Duration::from_millis(501)).await;
    settle().await;

    assert_eq!(engine.status(), Status::Connected);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (1, Duration::ZERO),
            (2, Duration::from_millis(250)),
            (3, Duration::from_millis(500)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn out_of_band_outcome_completes_attempt() {
    // A transport that never answers; the outcome arrives through the engine API.
    let transport = tower::service_fn(|_req: HandshakeRequest| {
        futures::future::pending::<Result<HandshakeReply, std::io::Error>>()
    });
    let engine = ReconnectEngine::new(config(), transport);

    engine.handshake();
    settle().await;
    assert_eq!(engine.status(), Status::Handshaking);

    assert!(engine.on_handshake_outcome(Err(HandshakeFailure::server_fault("boom"))));
    assert_eq!(engine.status(), Status::Unsuccessful);
    assert!(!engine.on_handshake_outcome(Ok(HandshakeReply::accepted("late"))));
}
