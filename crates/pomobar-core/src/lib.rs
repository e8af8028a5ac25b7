//! # Pomobar Core Library
//!
//! This library provides the core logic for the Pomobar menu-bar Pomodoro
//! timer. Every operation is available through the standalone `pomobar` CLI;
//! a status-bar host is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock countdown that derives remaining time from
//!   an anchor instant, so pauses and system sleep never drift the display
//! - **Session Cycle**: Work / short break / long break state machine with
//!   optional delayed auto-start
//! - **Statistics**: Daily, weekly and streak summaries over the session log
//! - **Storage**: SQLite session log and TOML configuration
//! - **Runtime**: A tokio task that serializes commands, polls the engine and
//!   publishes events
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SessionCycleController`]: Phase transitions and completion handling
//! - [`StatisticsAggregator`]: Read-only statistics queries
//! - [`TimerRuntime`]: Async host for the controller
//! - [`Database`]: Session persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod display;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod notify;
pub mod runtime;
pub mod stats;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::Event;
pub use hotkey::{HotkeyAction, ShortcutBinding};
pub use notify::{Notification, Notifier};
pub use runtime::{Command, TimerHandle, TimerRuntime};
pub use stats::StatisticsAggregator;
pub use storage::{Config, Database, MemoryStore, SessionRecord, SessionStore};
pub use timer::{
    CycleConfig, CycleTransition, SessionCycleController, SessionInfo, SessionType, TickOutcome,
    TimerEngine, TimerState,
};
