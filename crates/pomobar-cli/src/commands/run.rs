//! Foreground timer: the async runtime driven by line commands on stdin.
//!
//! Events are printed to stdout as JSON lines. Ticks are only printed when
//! the displayed second changes.

use pomobar_core::runtime::Command;
use pomobar_core::{
    Config, Database, Event, HotkeyAction, Notification, Notifier, TimerRuntime,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::timer::{load_controller, read_settings, save_controller};

#[derive(Debug)]
enum Input {
    Command(Command),
    Status,
    Reload,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let input = match verb {
        "start" => Input::Command(Command::Start),
        "pause" => Input::Command(Command::Pause),
        "toggle" => Input::Command(Command::StartPause),
        "stop" => Input::Command(Command::Stop),
        "reset" => Input::Command(Command::Reset),
        "suspend" => Input::Command(Command::SystemWillSuspend),
        "resume" => Input::Command(Command::SystemDidResume),
        "stats" => Input::Command(Command::Hotkey(HotkeyAction::ShowStatistics)),
        "duration" => {
            let minutes = words
                .next()
                .ok_or("usage: duration <minutes>")?
                .parse::<u32>()
                .map_err(|e| format!("invalid minutes: {e}"))?;
            Input::Command(Command::SetDuration(minutes))
        }
        "hotkey" => {
            let action = words
                .next()
                .ok_or("usage: hotkey <start_pause|reset|show_statistics>")?
                .parse::<HotkeyAction>()?;
            Input::Command(Command::Hotkey(action))
        }
        "status" => Input::Status,
        "reload" => Input::Reload,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(input))
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&mut self, notification: &Notification) {
        let bell = if notification.sound { "\x07" } else { "" };
        eprintln!("{bell}{}: {}", notification.title, notification.body);
    }
}

fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to encode event"),
    }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(serve())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let state_db = Database::open()?;
    let loaded = read_settings();
    let restored = load_controller(&state_db, loaded.as_ref());
    let config = restored.settings(loaded);

    let (handle, task) = TimerRuntime::new(config, Box::new(Database::open()?))
        .with_controller(restored.controller)
        .with_notifier(Box::new(StderrNotifier))
        .spawn();

    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut last_second = None;
        loop {
            match events.recv().await {
                Ok(Event::Tick { remaining_secs, .. })
                    if last_second == Some(remaining_secs) => {}
                Ok(event) => {
                    if let Event::Tick { remaining_secs, .. } = &event {
                        last_second = Some(*remaining_secs);
                    }
                    print_event(&event);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin unreadable");
                break;
            }
        };
        let sent = match parse_input(&line) {
            Ok(None) => Ok(()),
            Ok(Some(Input::Command(command))) => handle.send(command),
            Ok(Some(Input::Status)) => handle.snapshot().await.map(|event| print_event(&event)),
            Ok(Some(Input::Reload)) => match Config::load() {
                Ok(config) => handle.configure(config),
                Err(e) => {
                    warn!(error = %e, "reload failed, keeping current settings");
                    Ok(())
                }
            },
            Ok(Some(Input::Quit)) => break,
            Err(message) => {
                eprintln!("{message}");
                Ok(())
            }
        };
        if let Err(e) = sent {
            warn!(error = %e, "timer runtime gone");
            break;
        }
    }
    debug!("input closed, shutting down");

    // Already closed if the runtime stopped on its own.
    let _ = handle.shutdown();
    let controller = task.await?;
    if restored.savable {
        save_controller(&state_db, &controller)?;
    }

    drop(handle);
    printer.await?;
    Ok(())
}
