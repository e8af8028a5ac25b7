//! Phase-completion notifications.
//!
//! The core decides *whether* to notify and composes the text; delivery is
//! the host's job through a [`Notifier`].

use serde::{Deserialize, Serialize};

use crate::storage::Config;
use crate::timer::SessionType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Play the completion sound alongside the banner.
    pub sound: bool,
}

impl Notification {
    /// Compose the message for a finished phase. `None` when the user has
    /// notifications turned off.
    pub fn compose(completed: SessionType, next: SessionType, config: &Config) -> Option<Self> {
        if !config.notifications_enabled {
            return None;
        }

        let body = if !config.full_cycle_mode {
            "Time's up! Take a break.".to_string()
        } else {
            match (completed, next) {
                (SessionType::Work, SessionType::LongBreak) => format!(
                    "Cycle complete! Enjoy a {}-minute long break.",
                    config.long_break_minutes
                ),
                (SessionType::Work, _) => format!(
                    "Nice work! Time for a {}-minute break.",
                    config.short_break_minutes
                ),
                (_, _) => format!(
                    "Break's over. Ready for {} minutes of focus?",
                    config.work_minutes
                ),
            }
        };

        Some(Self {
            title: format!("{} {} complete", completed.glyph(), completed.display_name()),
            body,
            sound: config.sound_enabled,
        })
    }
}

/// Delivers composed notifications (desktop banner, terminal bell, ...).
pub trait Notifier: Send {
    fn notify(&mut self, notification: &Notification);
}
