use chrono::Local;
use clap::Subcommand;
use pomobar_core::display::format_duration;
use pomobar_core::storage::Database;
use pomobar_core::{Config, StatisticsAggregator};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's completed pomodoros and focus time
    Today,
    /// Last seven days: total, daily average, streak
    Week,
    /// Progress toward the daily goal
    Goal {
        /// Override the configured goal
        #[arg(long)]
        goal: Option<u32>,
    },
    /// Consecutive days with a completed pomodoro
    Streak,
    /// Per-day counts for the last seven days
    Breakdown,
    /// Completed sessions of the last seven days, grouped by day
    History,
    /// One-line human-readable summary
    Summary,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let sessions = db.sessions()?;
    let stats = StatisticsAggregator::new(&sessions, Local::now());

    let output = match action {
        StatsAction::Today => serde_json::to_string_pretty(&stats.todays_stats())?,
        StatsAction::Week => serde_json::to_string_pretty(&stats.weekly_stats())?,
        StatsAction::Goal { goal } => {
            let goal = match goal {
                Some(goal) => goal,
                None => Config::load_or_default().daily_goal,
            };
            serde_json::to_string_pretty(&stats.daily_goal_progress(goal))?
        }
        StatsAction::Streak => {
            serde_json::to_string_pretty(&serde_json::json!({ "streak": stats.streak() }))?
        }
        StatsAction::Breakdown => serde_json::to_string_pretty(&stats.weekly_breakdown())?,
        StatsAction::History => serde_json::to_string_pretty(&stats.history())?,
        StatsAction::Summary => {
            let today = stats.todays_stats();
            let goal = stats.daily_goal_progress(Config::load_or_default().daily_goal);
            format!(
                "Today: {} pomodoros, {} focus, goal {}/{}, streak {} days",
                today.completed_pomodoros,
                format_duration(today.total_focus_secs),
                goal.completed,
                goal.goal,
                stats.streak()
            )
        }
    };
    println!("{output}");
    Ok(())
}
