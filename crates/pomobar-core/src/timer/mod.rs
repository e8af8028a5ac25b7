mod cycle;
mod engine;
mod phase;

pub use cycle::{CycleConfig, CycleTransition, SessionCycleController, SessionInfo, TickOutcome};
pub use engine::{TimerEngine, TimerState};
pub use phase::SessionType;
