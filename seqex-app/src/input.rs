use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use seqex_core::RunPhase;
use seqex_experiment::ExperimentEvent;
use seqex_timing::Clock;
use tokio::sync::mpsc;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A key press and the moment it was read off the terminal.
pub type StampedKey = (KeyEvent, DateTime<Utc>);

/// Reads key presses on a dedicated thread until the receiver goes away.
/// Each key is stamped with `clock` as soon as it is read.
pub fn spawn_reader<C: Clock + 'static>(
    keys: mpsc::UnboundedSender<StampedKey>,
    clock: C,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !keys.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    warn!(error = %err, "terminal input poll failed");
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if keys.send((key, clock.now())).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "terminal input read failed");
                    break;
                }
            }
        }
    })
}

/// Key value as a browser would report it.
pub fn key_name(code: KeyCode) -> Option<String> {
    match code {
        KeyCode::Char(c) => Some(c.to_string()),
        KeyCode::Backspace => Some("Backspace".into()),
        KeyCode::Enter => Some("Enter".into()),
        KeyCode::Tab => Some("Tab".into()),
        KeyCode::Delete => Some("Delete".into()),
        _ => None,
    }
}

pub fn map_key(key: KeyEvent, phase: RunPhase, pressed_at: DateTime<Utc>) -> Option<ExperimentEvent> {
    let interrupt =
        key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
    if key.code == KeyCode::Esc || interrupt {
        return (!phase.is_terminal()).then_some(ExperimentEvent::Abort);
    }

    match (phase, key.code) {
        (RunPhase::StartingExperiment, KeyCode::Enter | KeyCode::Char(' ')) => {
            Some(ExperimentEvent::StartPressed)
        }
        (phase, KeyCode::Enter) if phase.accepts_submission() => {
            Some(ExperimentEvent::SubmitPressed)
        }
        (phase, code) if phase.allows_input() => {
            key_name(code).map(|name| ExperimentEvent::key_at(name, pressed_at))
        }
        _ => None,
    }
}
