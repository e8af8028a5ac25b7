//! Property-based tests for the countdown arithmetic.
//!
//! Remaining time must always equal the phase length minus the whole seconds
//! actually spent running, no matter how the run is split by pauses or
//! system sleep.

use chrono::{Duration, Utc};
use pomobar_core::{Clock, Event, ManualClock, SessionType, TimerEngine};
use proptest::prelude::*;

const TOTAL_SECS: i64 = 25 * 60;

fn engine() -> (TimerEngine, ManualClock) {
    (
        TimerEngine::new(SessionType::Work, 25),
        ManualClock::new(Utc::now()),
    )
}

/// Run time in milliseconds, strictly shorter than the phase.
fn arb_run_ms() -> impl Strategy<Value = i64> {
    0i64..(TOTAL_SECS * 1000 / 2)
}

fn expected_remaining(run_ms: i64) -> u64 {
    (TOTAL_SECS - run_ms / 1000).max(0) as u64
}

proptest! {
    /// Property: remaining = total - floor(elapsed) while running
    #[test]
    fn remaining_is_total_minus_whole_elapsed_seconds(run_ms in 0i64..(TOTAL_SECS * 1000)) {
        let (mut engine, clock) = engine();
        engine.start(clock.now());
        clock.advance(Duration::milliseconds(run_ms));
        engine.tick(clock.now());
        prop_assert_eq!(engine.remaining_secs(), expected_remaining(run_ms));
        prop_assert_eq!(engine.remaining_at(clock.now()), expected_remaining(run_ms));
    }

    /// Property: time spent paused never counts
    #[test]
    fn pauses_are_excluded(
        before in arb_run_ms(),
        paused in 0i64..10_000_000,
        after in arb_run_ms(),
    ) {
        let (mut engine, clock) = engine();
        engine.start(clock.now());
        clock.advance(Duration::milliseconds(before));
        engine.pause(clock.now());
        clock.advance(Duration::milliseconds(paused));
        prop_assert_eq!(engine.remaining_at(clock.now()), expected_remaining(before));

        engine.start(clock.now());
        clock.advance(Duration::milliseconds(after));
        engine.tick(clock.now());
        prop_assert_eq!(engine.remaining_secs(), expected_remaining(before + after));
    }

    /// Property: system sleep never counts
    #[test]
    fn sleep_is_excluded(
        before in arb_run_ms(),
        slept in 0i64..10_000_000,
        after in arb_run_ms(),
    ) {
        let (mut engine, clock) = engine();
        engine.start(clock.now());
        clock.advance(Duration::milliseconds(before));
        engine.on_suspend(clock.now());
        clock.advance(Duration::milliseconds(slept));
        prop_assert_eq!(engine.remaining_at(clock.now()), expected_remaining(before));

        let compensated = engine.on_resume(clock.now());
        prop_assert_eq!(compensated, slept as f64 / 1000.0);
        clock.advance(Duration::milliseconds(after));
        engine.tick(clock.now());
        prop_assert_eq!(engine.remaining_secs(), expected_remaining(before + after));
    }

    /// Property: remaining never increases across ticks and completion fires once
    #[test]
    fn countdown_is_monotonic_and_completes_once(
        steps in prop::collection::vec(0i64..120_000, 1..80),
    ) {
        let (mut engine, clock) = engine();
        engine.start(clock.now());
        let mut last = engine.remaining_secs();
        let mut completions = 0;

        for step in steps {
            clock.advance(Duration::milliseconds(step));
            let events = engine.tick(clock.now());
            completions += events
                .iter()
                .filter(|e| matches!(e, Event::PhaseCompleted { .. }))
                .count();
            prop_assert!(engine.remaining_secs() <= last);
            last = engine.remaining_secs();
        }

        prop_assert!(completions <= 1);
        prop_assert_eq!(completions == 1, last == 0);
    }
}
