//! Property tests for the client lifecycle.
//!
//! Invariants tested:
//! - Rejected inputs leave the status unchanged
//! - Accepted inputs land on the status the transition table names
//! - Disconnected is only entered through a completed disconnect

use bayeux_reconnect::{Lifecycle, LifecycleInput, Status};
use proptest::prelude::*;

fn input_strategy() -> impl Strategy<Value = LifecycleInput> {
    prop_oneof![
        Just(LifecycleInput::BeginHandshake),
        Just(LifecycleInput::RetryFired),
        Just(LifecycleInput::HandshakeSucceeded),
        Just(LifecycleInput::HandshakeFailed),
        Just(LifecycleInput::ConnectFailed),
        Just(LifecycleInput::DisconnectRequested),
        Just(LifecycleInput::DisconnectCompleted),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: every input sequence keeps the lifecycle consistent
    #[test]
    fn random_inputs_follow_table(
        inputs in prop::collection::vec(input_strategy(), 0..64),
    ) {
        let mut lifecycle = Lifecycle::new();

        for input in inputs {
            let before = lifecycle.status();
            match lifecycle.apply(input) {
                Ok(transition) => {
                    prop_assert_eq!(transition.from, before);
                    prop_assert_eq!(Some(transition.to), Lifecycle::target(before, input));
                    prop_assert_eq!(lifecycle.status(), transition.to);
                    if transition.to == Status::Disconnected {
                        prop_assert_eq!(input, LifecycleInput::DisconnectCompleted);
                        prop_assert_eq!(before, Status::Disconnecting);
                    }
                }
                Err(err) => {
                    prop_assert_eq!(err.from, before);
                    prop_assert_eq!(err.input, input);
                    prop_assert_eq!(lifecycle.status(), before);
                    prop_assert!(Lifecycle::target(before, input).is_none());
                }
            }
        }
    }

    /// Property: failures and retries alone never leave the retry cycle
    #[test]
    fn retry_cycle_never_disconnects(
        failures in prop::collection::vec(any::<bool>(), 1..32),
    ) {
        let mut lifecycle = Lifecycle::new();
        lifecycle.apply(LifecycleInput::BeginHandshake).unwrap();

        for failed in failures {
            if lifecycle.status() == Status::Connected {
                lifecycle.apply(LifecycleInput::ConnectFailed).unwrap();
                lifecycle.apply(LifecycleInput::RetryFired).unwrap();
            }
            let input = if failed {
                LifecycleInput::HandshakeFailed
            } else {
                LifecycleInput::HandshakeSucceeded
            };
            lifecycle.apply(input).unwrap();
            prop_assert_ne!(lifecycle.status(), Status::Disconnected);

            if lifecycle.status() == Status::Unsuccessful {
                lifecycle.apply(LifecycleInput::RetryFired).unwrap();
            }
        }
    }
}
