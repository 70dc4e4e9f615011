use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossterm::cursor::{self, MoveTo};
use crossterm::event::{KeyCode, KeyEvent};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use rand::SeedableRng;
use rand::rngs::StdRng;
use seqex_core::{Experiment, RunPhase};
use seqex_experiment::{ExperimentEvent, ExperimentStateMachine, RunReport, Snapshot};
use seqex_submit::{HttpResultsApi, Notification, SubmissionManager};
use seqex_timing::MonotonicClock;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::{input, view};

type Machine = ExperimentStateMachine<
    MonotonicClock,
    HttpResultsApi,
    mpsc::UnboundedSender<Notification>,
    StdRng,
>;

pub struct App {
    experiment: Arc<Experiment>,
    machine: Machine,
    /// Shared with the machine so key stamps and trial starts use one timeline.
    clock: MonotonicClock,
    notifications: mpsc::UnboundedReceiver<Notification>,
    survey_answers: serde_json::Value,
}

impl App {
    pub async fn new(cli: &Cli) -> Result<Self> {
        let raw = tokio::fs::read_to_string(&cli.bootstrap)
            .await
            .with_context(|| format!("Failed to read {}", cli.bootstrap.display()))?;
        let experiment = Arc::new(
            Experiment::from_json(&raw).context("Invalid experiment bootstrap data")?,
        );

        let survey_answers = match &cli.survey_answers {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&raw).context("Survey answers are not valid JSON")?
            }
            None => serde_json::Value::Object(Default::default()),
        };

        let api = HttpResultsApi::new(cli.api_config()).context("Failed to build HTTP client")?;
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        let clock = MonotonicClock::new();
        let machine = ExperimentStateMachine::new(
            experiment.clone(),
            cli.runner_config(),
            clock.clone(),
            StdRng::from_os_rng(),
            SubmissionManager::new(api, notify_tx),
        );

        info!(
            experiment = %experiment.code,
            blocks = experiment.main_block_count(),
            practice = experiment.practice.is_some(),
            "bootstrap loaded"
        );

        Ok(Self {
            experiment,
            machine,
            clock,
            notifications,
            survey_answers,
        })
    }

    pub async fn run(self) -> Result<RunReport> {
        let Self {
            experiment,
            machine,
            clock,
            mut notifications,
            survey_answers,
        } = self;

        let events = machine.sender();
        let mut snapshots = machine.subscribe();
        let mut run = tokio::spawn(machine.run());

        let _terminal = TerminalGuard::enter()?;
        let (key_tx, mut keys) = mpsc::unbounded_channel();
        input::spawn_reader(key_tx, clock);

        let mut snap = snapshots.borrow_and_update().clone();
        let mut notice: Option<Notification> = None;
        let mut survey_sent = false;
        draw(&view::render(&experiment, &snap, notice.as_ref()))?;

        let report = loop {
            tokio::select! {
                biased;
                finished = &mut run => break finished.context("Experiment task failed")?,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break (&mut run).await.context("Experiment task failed")?;
                    }
                    snap = snapshots.borrow_and_update().clone();
                    if snap.phase == RunPhase::AwaitingSurvey && !survey_sent {
                        survey_sent = true;
                        send(&events, ExperimentEvent::SurveyCompleted(survey_answers.clone()));
                    }
                }
                Some(n) = notifications.recv() => notice = Some(n),
                Some((key, pressed_at)) = keys.recv() => {
                    handle_key(&events, key, pressed_at, &snap, &survey_answers);
                }
            }
            draw(&view::render(&experiment, &snap, notice.as_ref()))?;
        };

        while let Ok(n) = notifications.try_recv() {
            notice = Some(n);
        }
        let final_snap = snapshots.borrow().clone();
        if !report.aborted {
            draw(&view::render(&experiment, &final_snap, notice.as_ref()))?;
            keys.recv().await;
        }

        Ok(report)
    }
}

fn handle_key(
    events: &mpsc::UnboundedSender<ExperimentEvent>,
    key: KeyEvent,
    pressed_at: DateTime<Utc>,
    snap: &Snapshot,
    survey_answers: &serde_json::Value,
) {
    let event = match (snap.phase, key.code) {
        (RunPhase::AwaitingSurvey, KeyCode::Enter) => {
            Some(ExperimentEvent::SurveyCompleted(survey_answers.clone()))
        }
        (phase, _) => input::map_key(key, phase, pressed_at),
    };
    if let Some(event) = event {
        send(events, event);
    }
}

fn send(events: &mpsc::UnboundedSender<ExperimentEvent>, event: ExperimentEvent) {
    if events.send(event).is_err() {
        warn!("experiment task is gone, input dropped");
    }
}

fn draw(lines: &[String]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    queue!(out, Clear(ClearType::All))?;
    for (row, line) in lines.iter().enumerate() {
        queue!(out, MoveTo(0, row as u16), Print(line))?;
    }
    out.flush()
}

/// Raw mode on an alternate screen, restored on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw terminal mode")?;
        execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)
            .context("Failed to prepare the terminal")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
