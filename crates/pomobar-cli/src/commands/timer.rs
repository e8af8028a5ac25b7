use chrono::{DateTime, Utc};
use clap::Subcommand;
use pomobar_core::display::{menu_title, snap_minutes};
use pomobar_core::{
    Config, CycleConfig, Database, DatabaseError, Event, Notification, SessionCycleController,
    SessionStore,
};
use tracing::{info, warn};

pub(crate) const CONTROLLER_KEY: &str = "session_cycle";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Start when stopped or paused, pause when running
    Toggle,
    /// Stop the countdown, keeping the remaining time
    Stop,
    /// Stop and refill the current phase
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Print the menu-bar title (countdown, or a tomato when idle)
    Title,
    /// Change the length of the current phase
    SetDuration {
        /// Minutes (clamped to at least 1)
        minutes: u32,
        /// Snap to 5, 10, 15, 25, 45 or 60 when within two minutes
        #[arg(long)]
        snap: bool,
    },
    /// Tell the timer the system is going to sleep
    Suspend,
    /// Tell the timer the system woke up
    Resume,
}

/// Settings from disk. A file that cannot be read is logged and the timer
/// keeps the settings it was persisted with.
pub(crate) fn read_settings() -> Option<Config> {
    Config::load()
        .inspect_err(|e| warn!(error = %e, "settings unreadable, keeping current timer settings"))
        .ok()
}

/// A controller restored from the kv table.
pub(crate) struct Restored {
    pub controller: SessionCycleController,
    /// False when the stored state could not be read. Saving would then
    /// overwrite a timer that may still be running elsewhere.
    pub savable: bool,
}

impl Restored {
    /// The settings this invocation runs with: the file when it was readable,
    /// otherwise defaults carrying the controller's own cycle settings.
    pub(crate) fn settings(&self, loaded: Option<Config>) -> Config {
        match (loaded, self.controller.config()) {
            (Some(config), _) => config,
            (None, Some(cycle)) => Config::default().with_cycle(cycle),
            (None, None) => Config::default(),
        }
    }
}

/// Load the persisted controller, or a fresh one, with current settings applied.
pub(crate) fn load_controller(db: &Database, config: Option<&Config>) -> Restored {
    restore(db.kv_get(CONTROLLER_KEY), config)
}

fn restore(stored: Result<Option<String>, DatabaseError>, config: Option<&Config>) -> Restored {
    let fresh = || SessionCycleController::new(config.map(CycleConfig::from).unwrap_or_default());
    let (mut controller, savable) = match stored {
        Ok(Some(json)) => {
            let controller = serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable timer state");
                fresh()
            });
            (controller, true)
        }
        Ok(None) => (fresh(), true),
        Err(e) => {
            warn!(error = %e, "timer state unavailable, changes will not be saved");
            (fresh(), false)
        }
    };
    // Only re-apply when the file changed, so a custom set-duration survives.
    if let Some(config) = config {
        let cycle = CycleConfig::from(config);
        if controller.config() != Some(&cycle) {
            controller.configure(cycle, Utc::now());
        }
    }
    Restored {
        controller,
        savable,
    }
}

pub(crate) fn save_controller(
    db: &Database,
    controller: &SessionCycleController,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(controller)?;
    db.kv_set(CONTROLLER_KEY, &json)?;
    Ok(())
}

/// Apply any completion that happened since the last invocation.
///
/// Without a process running between invocations there is nothing to wait
/// the auto-start delay on, so a due auto-start happens immediately.
fn catch_up(
    controller: &mut SessionCycleController,
    db: &mut Database,
    config: &Config,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let outcome = controller.tick(now);
    let mut events: Vec<Event> = outcome
        .events
        .into_iter()
        .filter(|e| !matches!(e, Event::Tick { .. }))
        .collect();

    if let Some(transition) = outcome.transition {
        info!(
            completed = %transition.completed,
            next = %transition.next,
            "phase completed"
        );
        if let Some(record) = &transition.record {
            if let Err(e) = db.append(record) {
                warn!(error = %e, "failed to persist session");
            }
        }
        if let Some(n) = Notification::compose(transition.completed, transition.next, config) {
            eprintln!("{}: {}", n.title, n.body);
        }
        if transition.auto_start {
            events.extend(controller.auto_start(now));
        }
    }
    events
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    let loaded = read_settings();
    let restored = load_controller(&db, loaded.as_ref());
    let config = restored.settings(loaded);
    let Restored {
        mut controller,
        savable,
    } = restored;
    let now = Utc::now();

    let mut events = catch_up(&mut controller, &mut db, &config, now);
    match action {
        TimerAction::Start => events.extend(controller.start(now)),
        TimerAction::Pause => events.extend(controller.pause(now)),
        TimerAction::Toggle => events.extend(controller.toggle(now)),
        TimerAction::Stop => events.extend(controller.stop(now)),
        TimerAction::Reset => events.extend(controller.reset(now)),
        TimerAction::SetDuration { minutes, snap } => {
            let minutes = if snap { snap_minutes(minutes) } else { minutes };
            events.extend(controller.set_duration(minutes, now));
        }
        TimerAction::Suspend => events.push(controller.on_suspend(now)),
        TimerAction::Resume => events.push(controller.on_resume(now)),
        TimerAction::Status | TimerAction::Title => {}
    }

    if matches!(action, TimerAction::Title) {
        println!("{}", menu_title(controller.engine()));
    } else {
        events.push(controller.snapshot(now));
        println!("{}", serde_json::to_string_pretty(&events)?);
    }
    if savable {
        save_controller(&db, &controller)?;
    }
    Ok(())
}
