//! Property tests for linear backoff.
//!
//! Invariants tested:
//! - N consecutive failures from zero produce exactly N increments
//! - Growth is additive and saturating
//! - A ceiling is never exceeded by more than one increment
//! - Once at or above the ceiling the period is stable

use bayeux_reconnect::{LinearBackoff, next_delay};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: unbounded backoff after N failures equals N * increment
    #[test]
    fn failures_accumulate_linearly(
        increment_ms in 0u64..=10_000,
        failures in 0u32..=200,
    ) {
        let policy = LinearBackoff::new(Duration::from_millis(increment_ms));

        let mut period = Duration::ZERO;
        for _ in 0..failures {
            period = policy.next_period(period);
        }

        prop_assert_eq!(period, Duration::from_millis(increment_ms * failures as u64));
    }

    /// Property: next_delay adds exactly one increment
    #[test]
    fn next_delay_is_additive(
        current_ms in 0u64..=1_000_000,
        increment_ms in 0u64..=1_000_000,
    ) {
        let next = next_delay(
            Duration::from_millis(current_ms),
            Duration::from_millis(increment_ms),
        );
        prop_assert_eq!(next, Duration::from_millis(current_ms + increment_ms));
        prop_assert!(next >= Duration::from_millis(current_ms));
    }

    /// Property: next_delay never overflows
    #[test]
    fn next_delay_saturates(increment_ms in 1u64..=u64::MAX / 2) {
        let next = next_delay(Duration::MAX, Duration::from_millis(increment_ms));
        prop_assert_eq!(next, Duration::MAX);
    }

    /// Property: a ceiling caps growth within one increment and then holds
    #[test]
    fn ceiling_bounds_growth(
        increment_ms in 1u64..=5_000,
        max_ms in 1u64..=60_000,
        failures in 1u32..=100,
    ) {
        let increment = Duration::from_millis(increment_ms);
        let max = Duration::from_millis(max_ms);
        let policy = LinearBackoff::new(increment).max_backoff(max);

        let mut period = Duration::ZERO;
        for _ in 0..failures {
            let next = policy.next_period(period);
            prop_assert!(next >= period, "period must never shrink");
            if period >= max {
                prop_assert_eq!(next, period);
            }
            period = next;
        }

        prop_assert!(period < max + increment);
        prop_assert_eq!(policy.period_after(failures), period);
    }
}
