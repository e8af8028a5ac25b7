//! Text helpers shared by menu-bar style hosts.

use crate::timer::{TimerEngine, TimerState};

/// Minute values the duration slider snaps to.
pub const SNAP_POINTS: [u32; 6] = [5, 10, 15, 25, 45, 60];
const SNAP_THRESHOLD: u32 = 2;
const IDLE_TITLE: &str = "\u{1F345}";

/// `MM:SS` for a countdown. Minutes are not wrapped into hours.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `1h 5m` or `25m`.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// The status-item title: the countdown while running or paused, a tomato
/// otherwise.
pub fn menu_title(engine: &TimerEngine) -> String {
    match engine.state() {
        TimerState::Running | TimerState::Paused => format_clock(engine.remaining_secs()),
        TimerState::Idle => IDLE_TITLE.to_string(),
    }
}

/// Snap a raw slider value to a common interval when within two minutes.
pub fn snap_minutes(raw: u32) -> u32 {
    SNAP_POINTS
        .iter()
        .copied()
        .find(|point| raw.abs_diff(*point) <= SNAP_THRESHOLD)
        .unwrap_or(raw)
}
