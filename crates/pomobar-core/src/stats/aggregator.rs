//! Daily and weekly summaries over the session log.
//!
//! Every query is a pure function of a snapshot of records plus "now".
//! Calendar days are taken in the time zone of `now`, so the CLI passes
//! `Local::now()` and tests pass a fixed offset.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::SessionRecord;
use crate::timer::SessionType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStats {
    pub completed_pomodoros: usize,
    pub total_focus_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub total_pomodoros: usize,
    pub average_per_day: f64,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub completed: usize,
    pub goal: u32,
    /// 0.0 ..= 1.0
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon".
    pub day_name: String,
    pub work_sessions: usize,
    pub short_breaks: usize,
    pub long_breaks: usize,
    pub total_focus_secs: f64,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHistory {
    pub date: NaiveDate,
    pub sessions: Vec<SessionRecord>,
}

/// Read-only view over a snapshot of the session log.
pub struct StatisticsAggregator<'a, Tz: TimeZone> {
    sessions: &'a [SessionRecord],
    now: DateTime<Tz>,
}

impl<'a, Tz: TimeZone> StatisticsAggregator<'a, Tz> {
    pub fn new(sessions: &'a [SessionRecord], now: DateTime<Tz>) -> Self {
        Self { sessions, now }
    }

    pub fn todays_stats(&self) -> TodayStats {
        let today = self.today();
        let (count, secs) = self
            .completed_work()
            .filter(|s| self.day_of(s) == today)
            .fold((0, 0.0), |(n, secs), s| (n + 1, secs + s.duration_secs));
        TodayStats {
            completed_pomodoros: count,
            total_focus_secs: secs,
        }
    }

    pub fn weekly_stats(&self) -> WeeklyStats {
        let week_ago = self.week_ago();
        let total = self
            .completed_work()
            .filter(|s| s.start_time >= week_ago)
            .count();
        WeeklyStats {
            total_pomodoros: total,
            average_per_day: total as f64 / 7.0,
            streak: self.streak(),
        }
    }

    /// Today's completed work sessions against `goal`. A goal of zero is
    /// never reached.
    pub fn daily_goal_progress(&self, goal: u32) -> GoalProgress {
        let completed = self.todays_stats().completed_pomodoros;
        let progress = if goal == 0 {
            0.0
        } else {
            (completed as f64 / f64::from(goal)).min(1.0)
        };
        GoalProgress {
            completed,
            goal,
            progress,
        }
    }

    /// Consecutive days, ending today, with at least one completed work
    /// session. Zero when today has none yet.
    pub fn streak(&self) -> u32 {
        let days: HashSet<NaiveDate> = self.completed_work().map(|s| self.day_of(s)).collect();
        let mut streak = 0;
        let mut day = self.today();
        while days.contains(&day) {
            streak += 1;
            match day.pred_opt() {
                Some(previous) => day = previous,
                None => break,
            }
        }
        streak
    }

    /// The last seven days including today, oldest first.
    pub fn weekly_breakdown(&self) -> Vec<DailyBreakdown> {
        let today = self.today();
        (0..7)
            .rev()
            .map(|offset| {
                let date = today - Duration::days(offset);
                let mut day = DailyBreakdown {
                    date,
                    day_name: date.format("%a").to_string(),
                    work_sessions: 0,
                    short_breaks: 0,
                    long_breaks: 0,
                    total_focus_secs: 0.0,
                    is_today: date == today,
                };
                for s in self
                    .sessions
                    .iter()
                    .filter(|s| s.completed && self.day_of(s) == date)
                {
                    match s.session_type {
                        SessionType::Work => {
                            day.work_sessions += 1;
                            day.total_focus_secs += s.duration_secs;
                        }
                        SessionType::ShortBreak => day.short_breaks += 1,
                        SessionType::LongBreak => day.long_breaks += 1,
                    }
                }
                day
            })
            .collect()
    }

    /// Completed sessions of the last seven days grouped by day, most
    /// recent day (and session) first.
    pub fn history(&self) -> Vec<DayHistory> {
        let week_ago = self.week_ago();
        let mut by_day: BTreeMap<NaiveDate, Vec<SessionRecord>> = BTreeMap::new();
        for s in self
            .sessions
            .iter()
            .filter(|s| s.completed && s.start_time >= week_ago)
        {
            by_day.entry(self.day_of(s)).or_default().push(s.clone());
        }
        by_day
            .into_iter()
            .rev()
            .map(|(date, mut sessions)| {
                sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
                DayHistory { date, sessions }
            })
            .collect()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn completed_work(&self) -> impl Iterator<Item = &'a SessionRecord> {
        let sessions: &'a [SessionRecord] = self.sessions;
        sessions
            .iter()
            .filter(|s| s.completed && s.session_type == SessionType::Work)
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn week_ago(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc) - Duration::days(7)
    }

    fn day_of(&self, session: &SessionRecord) -> NaiveDate {
        session
            .start_time
            .with_timezone(&self.now.timezone())
            .date_naive()
    }
}
