//! Statistics over the persisted session log.
//!
//! Daily totals, weekly totals and streaks, goal progress, the per-day
//! breakdown and grouped history shown in the statistics window.

mod aggregator;

pub use aggregator::{
    DailyBreakdown, DayHistory, GoalProgress, StatisticsAggregator, TodayStats, WeeklyStats,
};
