//! Pomodoro session cycle.
//!
//! [`SessionCycleController`] owns the [`TimerEngine`] and the
//! work → short break → … → long break state machine. It advances only when
//! the engine reports a completion, loads the next phase at full length,
//! and tells the host whether to persist the finished phase and whether to
//! schedule an auto-start.
//!
//! ```text
//! Work --(pos <= interval)--> ShortBreak --> Work
//! Work --(pos >  interval)--> LongBreak  --> Work   (pos reset to 1)
//! ```
//!
//! In simple mode (`full_cycle_mode = false`) there is a single Work phase
//! and every completion is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::TimerEngine;
use super::phase::SessionType;
use crate::events::Event;
use crate::storage::{Config, SessionRecord};

/// The subset of settings the state machine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleConfig {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    /// Work sessions per cycle; the last one is followed by a long break.
    pub long_break_interval: u32,
    pub full_cycle_mode: bool,
    pub auto_start_next: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig::from(&Config::default())
    }
}

impl From<&Config> for CycleConfig {
    fn from(config: &Config) -> Self {
        Self {
            work_minutes: config.work_minutes,
            short_break_minutes: config.short_break_minutes,
            long_break_minutes: config.long_break_minutes,
            long_break_interval: config.long_break_interval,
            full_cycle_mode: config.full_cycle_mode,
            auto_start_next: config.auto_start_next,
        }
        .sanitized()
    }
}

impl CycleConfig {
    /// Clamp every length and the interval to at least one.
    pub fn sanitized(mut self) -> Self {
        self.work_minutes = self.work_minutes.max(1);
        self.short_break_minutes = self.short_break_minutes.max(1);
        self.long_break_minutes = self.long_break_minutes.max(1);
        self.long_break_interval = self.long_break_interval.max(1);
        self
    }

    pub fn minutes_for(&self, session_type: SessionType) -> u32 {
        match session_type {
            SessionType::Work => self.work_minutes,
            SessionType::ShortBreak => self.short_break_minutes,
            SessionType::LongBreak => self.long_break_minutes,
        }
    }
}

/// What happened when a phase finished.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTransition {
    pub completed: SessionType,
    pub next: SessionType,
    pub cycle_position: u32,
    /// Host should start the next phase after the auto-start delay.
    pub auto_start: bool,
    /// Present only for Work completions.
    pub record: Option<SessionRecord>,
}

/// Result of one poll step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// `Tick`, then on completion `PhaseCompleted` and `SessionTypeChanged`.
    pub events: Vec<Event>,
    pub transition: Option<CycleTransition>,
}

/// Where the cycle stands, for menus and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_type: SessionType,
    pub cycle_position: u32,
    pub long_break_interval: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCycleController {
    engine: TimerEngine,
    /// `None` until configured; completions then degrade to simple mode
    /// with the engine's last known duration.
    config: Option<CycleConfig>,
    current: SessionType,
    cycle_position: u32,
    work_sessions_completed: u64,
}

impl SessionCycleController {
    pub fn new(config: CycleConfig) -> Self {
        let config = config.sanitized();
        Self {
            engine: TimerEngine::new(SessionType::Work, config.work_minutes),
            config: Some(config),
            current: SessionType::Work,
            cycle_position: 1,
            work_sessions_completed: 0,
        }
    }

    /// A controller around an engine that has not been given settings yet.
    pub fn unconfigured(engine: TimerEngine) -> Self {
        Self {
            current: engine.session_type(),
            engine,
            config: None,
            cycle_position: 1,
            work_sessions_completed: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn config(&self) -> Option<&CycleConfig> {
        self.config.as_ref()
    }

    pub fn current_session_type(&self) -> SessionType {
        self.current
    }

    pub fn cycle_position(&self) -> u32 {
        self.cycle_position
    }

    pub fn work_sessions_completed(&self) -> u64 {
        self.work_sessions_completed
    }

    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            session_type: self.current,
            cycle_position: self.cycle_position,
            long_break_interval: self.config.as_ref().map_or(4, |c| c.long_break_interval),
        }
    }

    /// True when a scheduled auto-start may still fire: nothing was started
    /// manually in the meantime and no completion is being processed.
    pub fn can_auto_start(&self) -> bool {
        self.engine.is_idle() && !self.engine.completion_in_flight()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        let info = self.session_info();
        Event::StateSnapshot {
            state: self.engine.state(),
            session_type: self.current,
            remaining_secs: self.engine.remaining_at(now),
            total_secs: self.engine.total_secs(),
            cycle_position: info.cycle_position,
            long_break_interval: info.long_break_interval,
            full_cycle_mode: self.full_cycle_mode(),
            work_sessions_completed: self.work_sessions_completed,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.engine.start(now)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.engine.pause(now)
    }

    /// Start when stopped or paused, pause when running.
    pub fn toggle(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.engine.is_running() {
            self.engine.pause(now)
        } else {
            self.engine.start(now)
        }
    }

    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.engine.stop(now)
    }

    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.engine.reset(now)
    }

    /// Custom length for the phase currently loaded (menu slider).
    pub fn set_duration(&mut self, minutes: u32, now: DateTime<Utc>) -> Option<Event> {
        self.engine.set_duration(minutes, now)
    }

    pub fn on_suspend(&mut self, now: DateTime<Utc>) -> Event {
        self.engine.on_suspend(now);
        Event::SystemSuspended { at: now }
    }

    pub fn on_resume(&mut self, now: DateTime<Utc>) -> Event {
        let compensated_secs = self.engine.on_resume(now);
        Event::SystemResumed {
            compensated_secs,
            at: now,
        }
    }

    /// Start the phase loaded by the last transition, if still appropriate.
    pub fn auto_start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.can_auto_start() {
            return None;
        }
        self.engine.start(now)
    }

    /// Replace the settings wholesale and apply the active phase's length.
    pub fn configure(&mut self, config: CycleConfig, now: DateTime<Utc>) -> Vec<Event> {
        let config = config.sanitized();
        self.cycle_position = self.cycle_position.clamp(1, config.long_break_interval);

        let mut events = Vec::new();
        if !config.full_cycle_mode && self.current.is_break() && self.engine.is_idle() {
            self.current = SessionType::Work;
            self.cycle_position = 1;
            self.engine.load_phase(SessionType::Work, config.work_minutes);
            events.push(Event::SessionTypeChanged {
                session_type: SessionType::Work,
                cycle_position: self.cycle_position,
                at: now,
            });
        }
        events.extend(self.engine.set_duration(config.minutes_for(self.current), now));
        self.config = Some(config);
        events
    }

    /// Poll the engine and, on completion, advance the cycle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let mut events = self.engine.tick(now);
        let completion = events.iter().find_map(|e| match e {
            Event::PhaseCompleted {
                session_type,
                started_at,
                duration_secs,
                ..
            } => Some((*session_type, *started_at, *duration_secs)),
            _ => None,
        });

        let Some((completed, started_at, duration_secs)) = completion else {
            return TickOutcome {
                events,
                transition: None,
            };
        };

        let transition = self.advance(completed, started_at, duration_secs, now);
        if transition.next != completed {
            events.push(Event::SessionTypeChanged {
                session_type: transition.next,
                cycle_position: transition.cycle_position,
                at: now,
            });
        }
        TickOutcome {
            events,
            transition: Some(transition),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn full_cycle_mode(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.full_cycle_mode)
    }

    fn advance(
        &mut self,
        completed: SessionType,
        started_at: Option<DateTime<Utc>>,
        duration_secs: f64,
        now: DateTime<Utc>,
    ) -> CycleTransition {
        if completed == SessionType::Work {
            self.work_sessions_completed += 1;
        }
        let record = (completed == SessionType::Work).then(|| {
            SessionRecord::completed(
                completed,
                started_at.unwrap_or(now),
                now,
                duration_secs,
            )
        });

        let Some(config) = self.config.clone() else {
            // No settings: refill with the last known length and stay put.
            self.engine.reset(now);
            self.engine.clear_completion();
            return CycleTransition {
                completed,
                next: completed,
                cycle_position: self.cycle_position,
                auto_start: false,
                record,
            };
        };

        let next = if !config.full_cycle_mode {
            SessionType::Work
        } else {
            match completed {
                SessionType::Work => {
                    self.cycle_position += 1;
                    if self.cycle_position > config.long_break_interval {
                        self.cycle_position = 1;
                        SessionType::LongBreak
                    } else {
                        SessionType::ShortBreak
                    }
                }
                SessionType::ShortBreak | SessionType::LongBreak => SessionType::Work,
            }
        };

        self.current = next;
        self.engine.load_phase(next, config.minutes_for(next));
        self.engine.clear_completion();

        // Work -> break may auto-start; break -> work always waits for the user.
        let auto_start = config.full_cycle_mode
            && config.auto_start_next
            && completed == SessionType::Work
            && next.is_break();

        CycleTransition {
            completed,
            next,
            cycle_position: self.cycle_position,
            auto_start,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn full_cycle() -> CycleConfig {
        CycleConfig {
            full_cycle_mode: true,
            ..CycleConfig::default()
        }
    }

    /// Run the current phase to completion and return the transition.
    fn finish(ctl: &mut SessionCycleController, clock: &ManualClock) -> CycleTransition {
        ctl.start(clock.now());
        clock.advance_secs(ctl.engine().remaining_secs() as i64);
        ctl.tick(clock.now())
            .transition
            .expect("phase should complete")
    }

    #[test]
    fn defaults_match_first_run_settings() {
        let cfg = CycleConfig::default();
        assert_eq!(cfg.work_minutes, 25);
        assert_eq!(cfg.short_break_minutes, 5);
        assert_eq!(cfg.long_break_minutes, 15);
        assert_eq!(cfg.long_break_interval, 4);
        assert!(!cfg.full_cycle_mode);
        assert!(cfg.auto_start_next);
    }

    #[test]
    fn work_goes_to_short_break_then_back() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());

        let t = finish(&mut ctl, &clock);
        assert_eq!(t.completed, SessionType::Work);
        assert_eq!(t.next, SessionType::ShortBreak);
        assert_eq!(ctl.engine().remaining_secs(), 5 * 60);
        assert!(ctl.engine().is_idle());

        let t = finish(&mut ctl, &clock);
        assert_eq!(t.next, SessionType::Work);
        assert_eq!(ctl.engine().total_secs(), 25 * 60);
    }

    #[test]
    fn only_work_completions_produce_records() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());

        let work = finish(&mut ctl, &clock);
        let record = work.record.expect("work is persisted");
        assert_eq!(record.session_type, SessionType::Work);
        assert!(record.completed);
        assert_eq!(record.duration_secs, 1_500.0);

        let brk = finish(&mut ctl, &clock);
        assert!(brk.record.is_none());
    }

    #[test]
    fn auto_start_only_from_work_into_break() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());

        assert!(finish(&mut ctl, &clock).auto_start);
        assert!(!finish(&mut ctl, &clock).auto_start);

        let mut off = SessionCycleController::new(CycleConfig {
            auto_start_next: false,
            ..full_cycle()
        });
        assert!(!finish(&mut off, &clock).auto_start);
    }

    #[test]
    fn auto_start_rechecks_idle() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());
        finish(&mut ctl, &clock);

        ctl.start(clock.now());
        assert!(!ctl.can_auto_start());
        assert!(ctl.auto_start(clock.now()).is_none());
    }

    #[test]
    fn simple_mode_is_terminal() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(CycleConfig::default());

        let t = finish(&mut ctl, &clock);
        assert_eq!(t.next, SessionType::Work);
        assert!(!t.auto_start);
        assert!(t.record.is_some());
        assert!(ctl.engine().is_idle());
        assert_eq!(ctl.engine().remaining_secs(), 25 * 60);
    }

    #[test]
    fn completion_events_are_ordered() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());
        ctl.start(clock.now());
        clock.advance_secs(1_500);
        let outcome = ctl.tick(clock.now());

        let kinds: Vec<_> = outcome
            .events
            .iter()
            .map(|e| match e {
                Event::Tick { .. } => "tick",
                Event::PhaseCompleted { .. } => "completed",
                Event::SessionTypeChanged { .. } => "changed",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["tick", "completed", "changed"]);
    }

    #[test]
    fn unconfigured_completion_refills_and_stays() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::unconfigured(TimerEngine::new(SessionType::Work, 3));
        let t = finish(&mut ctl, &clock);
        assert_eq!(t.next, SessionType::Work);
        assert!(!t.auto_start);
        assert_eq!(ctl.engine().remaining_secs(), 180);
        assert!(!ctl.engine().completion_in_flight());
    }

    #[test]
    fn configure_updates_idle_duration_and_keeps_running_one() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());
        ctl.configure(
            CycleConfig {
                work_minutes: 50,
                ..full_cycle()
            },
            clock.now(),
        );
        assert_eq!(ctl.engine().remaining_secs(), 50 * 60);

        ctl.start(clock.now());
        clock.advance_secs(60);
        ctl.configure(
            CycleConfig {
                work_minutes: 10,
                ..full_cycle()
            },
            clock.now(),
        );
        assert_eq!(ctl.engine().total_secs(), 600);
        ctl.tick(clock.now());
        assert_eq!(ctl.engine().remaining_secs(), 49 * 60);
    }

    #[test]
    fn leaving_full_cycle_mode_during_idle_break_returns_to_work() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());
        finish(&mut ctl, &clock);
        assert_eq!(ctl.current_session_type(), SessionType::ShortBreak);

        let events = ctl.configure(CycleConfig::default(), clock.now());
        assert_eq!(ctl.current_session_type(), SessionType::Work);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionTypeChanged { .. })));
    }

    #[test]
    fn sanitized_clamps_zeroes() {
        let cfg = CycleConfig {
            work_minutes: 0,
            short_break_minutes: 0,
            long_break_minutes: 0,
            long_break_interval: 0,
            full_cycle_mode: true,
            auto_start_next: true,
        }
        .sanitized();
        assert_eq!(cfg.work_minutes, 1);
        assert_eq!(cfg.long_break_interval, 1);
    }

    #[test]
    fn toggle_past_zero_does_not_lose_the_work_session() {
        let clock = ManualClock::new(Utc::now());
        let mut ctl = SessionCycleController::new(full_cycle());
        ctl.start(clock.now());
        clock.advance(chrono::Duration::milliseconds(25 * 60 * 1000 + 50));

        assert!(ctl.toggle(clock.now()).is_none());
        let t = ctl.tick(clock.now()).transition.expect("work completes");
        assert_eq!(t.completed, SessionType::Work);
        assert!(t.record.is_some());
        assert_eq!(ctl.current_session_type(), SessionType::ShortBreak);
        assert_eq!(ctl.work_sessions_completed(), 1);
    }
}
