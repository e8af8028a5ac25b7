//! Timer engine implementation.
//!
//! The timer engine is an anchored wall-clock countdown. It does not use
//! internal threads or read the clock itself: every command takes the
//! current instant, and the caller is responsible for calling `tick()`
//! periodically (every 100ms in the runtime) while it runs.
//!
//! Remaining time is never decremented. It is recomputed on each tick as
//!
//! ```text
//! remaining = max(0, total - floor(now - anchor - accumulated_pause))
//! ```
//!
//! so a late or skipped poll cannot make the countdown drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> (completion) -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(SessionType::Work, 25);
//! engine.start(clock.now());
//! // In a loop:
//! for event in engine.tick(clock.now()) { /* Tick, then PhaseCompleted once */ }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::phase::SessionType;
use crate::clock::seconds_between;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Core timer engine.
///
/// Serializable so a one-shot host (the CLI) can persist it between
/// invocations; the anchor keeps counting while nothing is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    session_type: SessionType,
    total_secs: u64,
    /// Last recomputed remaining time, whole seconds.
    remaining_secs: u64,
    /// Instant from which elapsed time is derived. Set once per run.
    #[serde(default)]
    anchor: Option<DateTime<Utc>>,
    /// Phase length the current run counts against. Fixed when the anchor
    /// is set, so a duration change never truncates a run in progress.
    #[serde(default)]
    run_total_secs: Option<u64>,
    #[serde(default)]
    accumulated_pause_secs: f64,
    #[serde(default)]
    paused_at: Option<DateTime<Utc>>,
    /// Set by `on_suspend` while running, consumed by `on_resume`.
    #[serde(default)]
    suspended_at: Option<DateTime<Utc>>,
    /// When the current phase was first started; survives pause/resume.
    #[serde(default)]
    run_started_at: Option<DateTime<Utc>>,
    running: bool,
    paused: bool,
    #[serde(default)]
    completion_in_flight: bool,
}

impl TimerEngine {
    /// Create an idle engine loaded with a full-length phase.
    pub fn new(session_type: SessionType, minutes: u32) -> Self {
        let total_secs = minutes_to_secs(minutes);
        Self {
            session_type,
            total_secs,
            remaining_secs: total_secs,
            anchor: None,
            run_total_secs: None,
            accumulated_pause_secs: 0.0,
            paused_at: None,
            suspended_at: None,
            run_started_at: None,
            running: false,
            paused: false,
            completion_in_flight: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        if self.running {
            TimerState::Running
        } else if self.paused {
            TimerState::Paused
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Neither running nor paused.
    pub fn is_idle(&self) -> bool {
        !self.running && !self.paused
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    /// Remaining time as of the last command or tick.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn completion_in_flight(&self) -> bool {
        self.completion_in_flight
    }

    pub fn run_started_at(&self) -> Option<DateTime<Utc>> {
        self.run_started_at
    }

    /// Remaining time at `now` without mutating the engine.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        if !self.running {
            return self.remaining_secs;
        }
        let elapsed = self.elapsed_secs(now).floor() as u64;
        self.target_secs().saturating_sub(elapsed)
    }

    /// Running countdown has reached zero but no tick has reported it yet.
    pub fn completion_due(&self, now: DateTime<Utc>) -> bool {
        self.running && !self.completion_in_flight && self.remaining_at(now) == 0
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the countdown.
    ///
    /// No-op while running, and rejected while a completion has not yet been
    /// acknowledged with [`clear_completion`](Self::clear_completion).
    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.running || self.completion_in_flight {
            return None;
        }
        if self.remaining_secs == 0 {
            self.remaining_secs = self.total_secs;
            self.clear_run();
        }

        if let Some(paused_at) = self.paused_at.take() {
            if self.anchor.is_some() {
                self.accumulated_pause_secs += seconds_between(paused_at, now).max(0.0);
            }
        }
        if self.anchor.is_none() {
            self.remaining_secs = self.remaining_secs.min(self.total_secs);
            let elapsed = self.total_secs - self.remaining_secs;
            self.anchor = Some(now - Duration::seconds(elapsed as i64));
            self.run_total_secs = Some(self.total_secs);
            self.accumulated_pause_secs = 0.0;
        }
        if self.run_started_at.is_none() {
            self.run_started_at = Some(now);
        }

        self.running = true;
        self.paused = false;
        Some(Event::TimerStarted {
            session_type: self.session_type,
            remaining_secs: self.remaining_secs,
            total_secs: self.target_secs(),
            at: now,
        })
    }

    /// Pause the countdown.
    ///
    /// Refused once the countdown has reached zero: the engine stays running
    /// so the next `tick()` reports the completion.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.running {
            return None;
        }
        // A pause that lands mid-suspend first folds the sleep interval in.
        self.compensate_suspend(now);
        if self.completion_due(now) {
            return None;
        }
        self.recompute(now);
        self.running = false;
        self.paused = true;
        self.paused_at = Some(now);
        Some(Event::TimerPaused {
            session_type: self.session_type,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    /// Drop all run accounting. Remaining time is kept as-is.
    ///
    /// Like `pause`, refused once a running countdown has reached zero.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.running {
            self.compensate_suspend(now);
            if self.completion_due(now) {
                return None;
            }
            self.recompute(now);
        }
        self.running = false;
        self.paused = false;
        self.clear_run();
        Some(Event::TimerStopped {
            session_type: self.session_type,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.stop(now)?;
        self.remaining_secs = self.total_secs;
        Some(Event::TimerReset {
            session_type: self.session_type,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    /// Change the phase length. An in-flight countdown keeps its remaining
    /// time; only an idle engine is refilled.
    pub fn set_duration(&mut self, minutes: u32, now: DateTime<Utc>) -> Option<Event> {
        self.total_secs = minutes_to_secs(minutes);
        if self.is_idle() {
            self.remaining_secs = self.total_secs;
        }
        Some(Event::DurationChanged {
            session_type: self.session_type,
            total_secs: self.total_secs,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    /// Load a fresh, full-length phase. Any run in progress is abandoned.
    pub fn load_phase(&mut self, session_type: SessionType, minutes: u32) {
        self.running = false;
        self.paused = false;
        self.clear_run();
        self.session_type = session_type;
        self.total_secs = minutes_to_secs(minutes);
        self.remaining_secs = self.total_secs;
    }

    /// Poll step. Returns `Tick`, followed by `PhaseCompleted` the one time
    /// remaining reaches zero. Returns nothing unless running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if !self.running || self.completion_in_flight {
            return Vec::new();
        }
        self.recompute(now);
        let mut events = vec![Event::Tick {
            session_type: self.session_type,
            remaining_secs: self.remaining_secs,
            at: now,
        }];

        if self.remaining_secs == 0 {
            self.completion_in_flight = true;
            self.running = false;
            self.paused = false;
            let started_at = self.run_started_at;
            let duration_secs = self.target_secs() as f64;
            self.clear_run();
            events.push(Event::PhaseCompleted {
                session_type: self.session_type,
                started_at,
                duration_secs,
                at: now,
            });
        }
        events
    }

    /// Acknowledge a completion so the engine may be started again.
    pub fn clear_completion(&mut self) {
        self.completion_in_flight = false;
    }

    /// Host is about to sleep.
    /// Repeated calls keep the earliest marker.
    pub fn on_suspend(&mut self, now: DateTime<Utc>) {
        if self.running {
            self.suspended_at.get_or_insert(now);
        }
    }

    /// Host woke up. Shifts the anchor past the sleep interval so the
    /// countdown does not advance while asleep. Returns the seconds removed.
    pub fn on_resume(&mut self, now: DateTime<Utc>) -> f64 {
        if !self.running {
            self.suspended_at = None;
            return 0.0;
        }
        self.compensate_suspend(now)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn target_secs(&self) -> u64 {
        self.run_total_secs.unwrap_or(self.total_secs)
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let Some(anchor) = self.anchor else {
            return self.target_secs().saturating_sub(self.remaining_secs) as f64;
        };
        // While suspended the clock is considered frozen.
        let now = match self.suspended_at {
            Some(suspended) if suspended < now => suspended,
            _ => now,
        };
        // Subtract in whole milliseconds so the floor is exact.
        let paused_ms = (self.accumulated_pause_secs * 1000.0).round();
        let elapsed_ms = (seconds_between(anchor, now) * 1000.0).round() - paused_ms;
        (elapsed_ms / 1000.0).max(0.0)
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        let elapsed = self.elapsed_secs(now).floor() as u64;
        self.remaining_secs = self.target_secs().saturating_sub(elapsed);
    }

    fn compensate_suspend(&mut self, now: DateTime<Utc>) -> f64 {
        let Some(suspended_at) = self.suspended_at.take() else {
            return 0.0;
        };
        let slept = now - suspended_at;
        if slept <= Duration::zero() {
            return 0.0;
        }
        if let Some(anchor) = self.anchor.as_mut() {
            *anchor += slept;
        }
        slept.num_milliseconds() as f64 / 1000.0
    }

    fn clear_run(&mut self) {
        self.anchor = None;
        self.run_total_secs = None;
        self.accumulated_pause_secs = 0.0;
        self.paused_at = None;
        self.suspended_at = None;
        self.run_started_at = None;
    }
}

/// Phase lengths below one minute are clamped up to one.
fn minutes_to_secs(minutes: u32) -> u64 {
    u64::from(minutes.max(1)).saturating_mul(60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn work(minutes: u32) -> (TimerEngine, ManualClock) {
        (
            TimerEngine::new(SessionType::Work, minutes),
            ManualClock::new(Utc::now()),
        )
    }

    fn completions(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::PhaseCompleted { .. }))
            .count()
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, clock) = work(25);
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(engine.start(clock.now()).is_some());
        assert_eq!(engine.state(), TimerState::Running);
        assert!(engine.start(clock.now()).is_none());

        assert!(engine.pause(clock.now()).is_some());
        assert_eq!(engine.state(), TimerState::Paused);
        assert!(engine.pause(clock.now()).is_none());

        assert!(engine.start(clock.now()).is_some());
        assert_eq!(engine.state(), TimerState::Running);
    }

    #[test]
    fn remaining_is_floor_of_elapsed() {
        let (mut engine, clock) = work(1);
        engine.start(clock.now());
        clock.advance(Duration::milliseconds(12_900));
        engine.tick(clock.now());
        assert_eq!(engine.remaining_secs(), 60 - 12);
    }

    #[test]
    fn completes_exactly_once() {
        let (mut engine, clock) = work(1);
        engine.start(clock.now());
        clock.advance_secs(59);
        assert_eq!(completions(&engine.tick(clock.now())), 0);

        clock.advance_secs(5);
        let events = engine.tick(clock.now());
        assert_eq!(completions(&events), 1);
        assert_eq!(engine.remaining_secs(), 0);
        assert!(engine.completion_in_flight());
        assert!(!engine.is_running());

        for _ in 0..5 {
            clock.advance(Duration::milliseconds(100));
            assert!(engine.tick(clock.now()).is_empty());
        }
    }

    #[test]
    fn start_rejected_until_completion_cleared() {
        let (mut engine, clock) = work(1);
        engine.start(clock.now());
        clock.advance_secs(60);
        engine.tick(clock.now());

        assert!(engine.start(clock.now()).is_none());
        engine.clear_completion();
        assert!(engine.start(clock.now()).is_some());
        assert_eq!(engine.remaining_secs(), 60);
    }

    #[test]
    fn pause_excludes_paused_interval() {
        let (mut engine, clock) = work(10);
        engine.start(clock.now());
        clock.advance_secs(100);
        engine.pause(clock.now());
        assert_eq!(engine.remaining_secs(), 500);

        clock.advance_secs(3_000);
        assert_eq!(engine.remaining_at(clock.now()), 500);
        engine.start(clock.now());
        clock.advance_secs(50);
        engine.tick(clock.now());
        assert_eq!(engine.remaining_secs(), 450);
    }

    #[test]
    fn sleep_interval_is_not_counted() {
        let (mut engine, clock) = work(10);
        engine.start(clock.now());
        clock.advance_secs(30);
        engine.on_suspend(clock.now());
        clock.advance_secs(7_200);
        let compensated = engine.on_resume(clock.now());
        assert_eq!(compensated, 7_200.0);
        clock.advance_secs(20);
        engine.tick(clock.now());
        assert_eq!(engine.remaining_secs(), 600 - 50);
    }

    #[test]
    fn pause_during_sleep_folds_in_the_sleep() {
        let (mut engine, clock) = work(10);
        engine.start(clock.now());
        clock.advance_secs(10);
        engine.on_suspend(clock.now());
        clock.advance_secs(500);
        engine.pause(clock.now());
        assert_eq!(engine.remaining_secs(), 590);
    }

    #[test]
    fn suspend_while_idle_is_ignored() {
        let (mut engine, clock) = work(5);
        engine.on_suspend(clock.now());
        clock.advance_secs(100);
        assert_eq!(engine.on_resume(clock.now()), 0.0);
        assert_eq!(engine.remaining_secs(), 300);
    }

    #[test]
    fn pause_past_zero_still_completes() {
        let (mut engine, clock) = work(1);
        engine.start(clock.now());
        clock.advance(Duration::milliseconds(60_050));

        assert!(engine.pause(clock.now()).is_none());
        assert!(engine.is_running());
        assert!(engine.completion_due(clock.now()));

        let events = engine.tick(clock.now());
        assert_eq!(completions(&events), 1);
        assert!(engine.completion_in_flight());
    }

    #[test]
    fn stop_and_reset_past_zero_leave_completion_pending() {
        let (mut engine, clock) = work(1);
        engine.start(clock.now());
        clock.advance_secs(61);

        assert!(engine.stop(clock.now()).is_none());
        assert!(engine.reset(clock.now()).is_none());
        assert!(engine.is_running());
        assert_eq!(completions(&engine.tick(clock.now())), 1);
    }

    #[test]
    fn pause_just_before_zero_is_accepted() {
        let (mut engine, clock) = work(1);
        engine.start(clock.now());
        clock.advance(Duration::milliseconds(59_999));
        assert!(engine.pause(clock.now()).is_some());
        assert_eq!(engine.remaining_secs(), 1);
        assert!(!engine.completion_due(clock.now()));
    }

    #[test]
    fn repeated_suspend_keeps_first_marker() {
        let (mut engine, clock) = work(10);
        engine.start(clock.now());
        clock.advance_secs(30);
        engine.on_suspend(clock.now());
        clock.advance_secs(600);
        engine.on_suspend(clock.now());
        clock.advance_secs(600);
        assert_eq!(engine.on_resume(clock.now()), 1_200.0);
        engine.tick(clock.now());
        assert_eq!(engine.remaining_secs(), 600 - 30);
    }

    #[test]
    fn stop_keeps_remaining_and_restart_continues_from_it() {
        let (mut engine, clock) = work(5);
        engine.start(clock.now());
        clock.advance_secs(40);
        engine.stop(clock.now());
        assert!(engine.is_idle());
        assert_eq!(engine.remaining_secs(), 260);

        clock.advance_secs(1_000);
        engine.start(clock.now());
        clock.advance_secs(10);
        engine.tick(clock.now());
        assert_eq!(engine.remaining_secs(), 250);
    }

    #[test]
    fn reset_refills() {
        let (mut engine, clock) = work(5);
        engine.start(clock.now());
        clock.advance_secs(40);
        engine.reset(clock.now());
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 300);
        assert!(engine.run_started_at().is_none());
    }

    #[test]
    fn set_duration_does_not_truncate_running_countdown() {
        let (mut engine, clock) = work(25);
        engine.start(clock.now());
        clock.advance_secs(60);
        engine.tick(clock.now());
        engine.set_duration(5, clock.now());
        assert_eq!(engine.total_secs(), 300);
        assert_eq!(engine.remaining_secs(), 1_440);
        clock.advance_secs(30);
        engine.tick(clock.now());
        assert_eq!(engine.remaining_secs(), 1_410);

        let (mut idle, clock) = work(25);
        idle.set_duration(45, clock.now());
        assert_eq!(idle.remaining_secs(), 45 * 60);
    }

    #[test]
    fn zero_minutes_clamps_to_one() {
        let engine = TimerEngine::new(SessionType::ShortBreak, 0);
        assert_eq!(engine.total_secs(), 60);
    }

    #[test]
    fn survives_serde_roundtrip_mid_run() {
        let (mut engine, clock) = work(25);
        engine.start(clock.now());
        clock.advance_secs(90);
        let json = serde_json::to_string(&engine).unwrap();
        let mut restored: TimerEngine = serde_json::from_str(&json).unwrap();
        restored.tick(clock.now());
        assert_eq!(restored.remaining_secs(), 1_500 - 90);
    }
}
