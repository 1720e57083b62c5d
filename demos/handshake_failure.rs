//! Handshake failure and recovery example
//!
//! This example drives a client against a server whose handshake extension
//! throws for the first few attempts, then accepts. It shows the backoff
//! period growing by one increment per failure, resetting on success, and a
//! final disconnect that stops all retries.
//!
//! Run with: cargo run --example handshake_failure
//! Set RUST_LOG=bayeux_reconnect=debug to see the engine's own logs.

use bayeux_reconnect::{
    HandshakeReply, HandshakeRequest, ReconnectConfig, ReconnectEngine, ReconnectEvent, Status,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

/// Number of handshakes the simulated server refuses before accepting.
const FAILING_HANDSHAKES: usize = 3;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Bayeux Handshake Reconnection Example ===\n");

    let handshakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handshakes);
    let transport = tower::service_fn(move |req: HandshakeRequest| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < FAILING_HANDSHAKES {
                // A misbehaving server extension
                panic!("extension rejected handshake #{}", req.attempt);
            }
            Ok::<_, std::io::Error>(HandshakeReply::accepted(format!("client-{}", req.attempt)))
        }
    });

    let config = ReconnectConfig::builder()
        .backoff_increment(Duration::from_millis(200))
        .max_backoff(Duration::from_secs(5))
        .name("demo")
        .on_handshake(|attempt| println!("  -> handshake attempt #{}", attempt))
        .on_unsuccessful(|failure, backoff| {
            println!("  !! {} (backoff now {:?})", failure, backoff);
        })
        .on_disconnect(|| println!("  -- disconnected"))
        .build();

    let engine = ReconnectEngine::new(config, transport);
    let connected = Arc::new(Notify::new());
    let notify = Arc::clone(&connected);
    engine.subscribe(move |event| {
        if let ReconnectEvent::HandshakeSucceeded {
            client_id,
            failures,
            ..
        } = event
        {
            println!(
                "  ok connected as {:?} after {} failure(s)",
                client_id.as_deref().unwrap_or("?"),
                failures
            );
            notify.notify_one();
        }
    });

    println!("1. Handshaking against a failing server");
    println!("   Increment 200ms, expect {} failures\n", FAILING_HANDSHAKES);
    engine.handshake();
    connected.notified().await;

    println!("\n   Status: {}", engine.status());
    println!("   Backoff after success: {:?}\n", engine.backoff_period());
    assert_eq!(engine.status(), Status::Connected);

    println!("2. Disconnecting");
    engine.disconnect();
    let total = handshakes.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(1)).await;
    println!(
        "\n   Handshakes sent: {} (none after disconnect: {})",
        total,
        handshakes.load(Ordering::SeqCst) == total
    );
    println!("   Final snapshot: {:?}", engine.snapshot());

    println!("\n=== Example Complete ===");
}
