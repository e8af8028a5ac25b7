//! Async host for the session cycle.
//!
//! [`TimerRuntime`] owns a [`SessionCycleController`] on a single tokio task.
//! Every mutation arrives as a [`Command`] on one queue, so user actions,
//! system sleep notifications and the poll timer never race. Events fan out
//! on a broadcast channel.
//!
//! The task polls the engine every [`POLL_INTERVAL`] while a countdown is
//! running and schedules the delayed auto-start after a work phase.

use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::CoreError;
use crate::events::Event;
use crate::hotkey::HotkeyAction;
use crate::notify::{Notification, Notifier};
use crate::storage::{Config, SessionStore};
use crate::timer::{CycleConfig, CycleTransition, SessionCycleController};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const AUTO_START_DELAY: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    /// Toggle between running and paused.
    StartPause,
    Stop,
    Reset,
    /// Minutes for the phase currently loaded.
    SetDuration(u32),
    Configure(Box<Config>),
    SystemWillSuspend,
    SystemDidResume,
    Hotkey(HotkeyAction),
    Snapshot(oneshot::Sender<Event>),
    Shutdown,
}

impl Command {
    /// User actions that start, pause or end the current countdown.
    fn acts_on_countdown(&self) -> bool {
        matches!(
            self,
            Command::Start
                | Command::Pause
                | Command::StartPause
                | Command::Stop
                | Command::Reset
                | Command::Hotkey(HotkeyAction::StartPause | HotkeyAction::Reset)
        )
    }
}

/// Cloneable front end to a spawned runtime.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<Event>,
}

impl TimerHandle {
    pub fn send(&self, command: Command) -> Result<(), CoreError> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::RuntimeClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Current state as a `StateSnapshot` event.
    pub async fn snapshot(&self) -> Result<Event, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| CoreError::RuntimeClosed)
    }

    pub fn start(&self) -> Result<(), CoreError> {
        self.send(Command::Start)
    }

    pub fn pause(&self) -> Result<(), CoreError> {
        self.send(Command::Pause)
    }

    pub fn toggle(&self) -> Result<(), CoreError> {
        self.send(Command::StartPause)
    }

    pub fn stop(&self) -> Result<(), CoreError> {
        self.send(Command::Stop)
    }

    pub fn reset(&self) -> Result<(), CoreError> {
        self.send(Command::Reset)
    }

    pub fn set_duration(&self, minutes: u32) -> Result<(), CoreError> {
        self.send(Command::SetDuration(minutes))
    }

    pub fn configure(&self, config: Config) -> Result<(), CoreError> {
        self.send(Command::Configure(Box::new(config)))
    }

    pub fn shutdown(&self) -> Result<(), CoreError> {
        self.send(Command::Shutdown)
    }
}

type AutoStart = Option<Pin<Box<Sleep>>>;

pub struct TimerRuntime {
    controller: SessionCycleController,
    config: Config,
    store: Box<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<Box<dyn Notifier>>,
    events: broadcast::Sender<Event>,
}

impl TimerRuntime {
    pub fn new(config: Config, store: Box<dyn SessionStore>) -> Self {
        let config = config.sanitized();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            controller: SessionCycleController::new(CycleConfig::from(&config)),
            config,
            store,
            clock: Arc::new(SystemClock),
            notifier: None,
            events,
        }
    }

    /// Resume from a previously persisted controller. The runtime's settings
    /// are applied to it when spawned, unless they already match.
    pub fn with_controller(mut self, controller: SessionCycleController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Start the runtime task. The join handle yields the final controller
    /// state once the task shuts down.
    pub fn spawn(mut self) -> (TimerHandle, JoinHandle<SessionCycleController>) {
        let cycle = CycleConfig::from(&self.config);
        if self.controller.config() != Some(&cycle) {
            let now = self.clock.now();
            self.controller.configure(cycle, now);
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let handle = TimerHandle {
            commands,
            events: self.events.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> SessionCycleController {
        let mut poll = time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut auto_start: AutoStart = None;

        debug!("timer runtime started");
        loop {
            let running = self.controller.engine().is_running();
            let pending = auto_start.is_some();

            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command, &mut auto_start).is_break() {
                        break;
                    }
                }
                _ = poll.tick(), if running => {
                    self.poll(&mut auto_start);
                }
                _ = wait(&mut auto_start), if pending => {
                    auto_start = None;
                    self.fire_auto_start();
                }
            }
        }
        debug!("timer runtime stopped");
        self.controller
    }

    fn handle(&mut self, command: Command, auto_start: &mut AutoStart) -> ControlFlow<()> {
        let now = self.clock.now();
        debug!(?command, "command");

        // A countdown that hit zero since the last poll completes before the
        // command sees it.
        let completed = if command.acts_on_countdown() {
            self.complete_if_due(now, auto_start)
        } else {
            false
        };

        match command {
            Command::Start => {
                cancel(auto_start);
                let event = self.controller.start(now);
                self.emit_opt(event);
            }
            Command::Pause => {
                cancel(auto_start);
                let event = self.controller.pause(now);
                self.emit_opt(event);
            }
            Command::StartPause | Command::Hotkey(HotkeyAction::StartPause) => {
                cancel(auto_start);
                // Meant for the countdown that just finished; do not start
                // the next phase with it.
                if !completed {
                    let event = self.controller.toggle(now);
                    self.emit_opt(event);
                }
            }
            Command::Stop => {
                cancel(auto_start);
                let event = self.controller.stop(now);
                self.emit_opt(event);
            }
            Command::Reset | Command::Hotkey(HotkeyAction::Reset) => {
                cancel(auto_start);
                let event = self.controller.reset(now);
                self.emit_opt(event);
            }
            Command::Hotkey(HotkeyAction::ShowStatistics) => {
                self.emit(Event::ShowStatistics { at: now });
            }
            Command::SetDuration(minutes) => {
                let event = self.controller.set_duration(minutes, now);
                self.emit_opt(event);
            }
            Command::Configure(config) => {
                cancel(auto_start);
                self.config = (*config).sanitized();
                for event in self
                    .controller
                    .configure(CycleConfig::from(&self.config), now)
                {
                    self.emit(event);
                }
            }
            Command::SystemWillSuspend => {
                let event = self.controller.on_suspend(now);
                self.emit(event);
            }
            Command::SystemDidResume => {
                let event = self.controller.on_resume(now);
                if let Event::SystemResumed {
                    compensated_secs, ..
                } = &event
                {
                    info!(compensated_secs, "resumed from sleep");
                }
                self.emit(event);
                self.poll(auto_start);
            }
            Command::Snapshot(reply) => {
                // The requester may have given up waiting.
                let _ = reply.send(self.controller.snapshot(now));
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn poll(&mut self, auto_start: &mut AutoStart) -> bool {
        let outcome = self.controller.tick(self.clock.now());
        for event in outcome.events {
            self.emit(event);
        }
        match outcome.transition {
            Some(transition) => {
                self.finish_phase(transition, auto_start);
                true
            }
            None => false,
        }
    }

    fn complete_if_due(&mut self, now: DateTime<Utc>, auto_start: &mut AutoStart) -> bool {
        if !self.controller.engine().completion_due(now) {
            return false;
        }
        debug!("countdown reached zero before the command");
        self.poll(auto_start)
    }

    fn finish_phase(&mut self, transition: CycleTransition, auto_start: &mut AutoStart) {
        info!(
            completed = %transition.completed,
            next = %transition.next,
            cycle_position = transition.cycle_position,
            "phase completed"
        );

        if let Some(record) = &transition.record {
            if let Err(e) = self.store.append(record) {
                warn!(error = %e, id = %record.id, "failed to persist session");
            }
        }

        if let Some(notifier) = self.notifier.as_mut() {
            if let Some(notification) =
                Notification::compose(transition.completed, transition.next, &self.config)
            {
                notifier.notify(&notification);
            }
        }

        if transition.auto_start {
            *auto_start = Some(Box::pin(time::sleep(AUTO_START_DELAY)));
        }
    }

    fn fire_auto_start(&mut self) {
        match self.controller.auto_start(self.clock.now()) {
            Some(event) => self.emit(event),
            None => debug!("auto-start skipped, timer no longer idle"),
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_opt(&self, event: Option<Event>) {
        if let Some(event) = event {
            self.emit(event);
        }
    }
}

fn cancel(auto_start: &mut AutoStart) {
    if auto_start.take().is_some() {
        debug!("pending auto-start cancelled");
    }
}

async fn wait(auto_start: &mut AutoStart) {
    match auto_start {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}
