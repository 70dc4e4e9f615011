use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use seqex_core::{BlockResult, Experiment, RunPhase};
use seqex_submit::{
    Notification, Notifier, ResultsApi, SubmissionManager, SubmissionStatus, SubmitOutcome,
};
use seqex_timing::{Clock, TimerService, whole_secs};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::run::ExperimentRun;
use crate::sequencer::BlockSequencer;
use crate::snapshot::Snapshot;

/// Inputs of the state machine: commands from the view and timer callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    StartPressed,
    /// A key press. `pressed_at` is when the input layer read it; without
    /// one the key is stamped when handled.
    Key {
        value: String,
        pressed_at: Option<DateTime<Utc>>,
    },
    SubmitPressed,
    SurveyCompleted(serde_json::Value),
    Abort,
    TimerTick { generation: u64, remaining: u64 },
    TimerExpired { generation: u64 },
}

impl ExperimentEvent {
    pub fn key(value: impl Into<String>) -> Self {
        Self::Key {
            value: value.into(),
            pressed_at: None,
        }
    }

    pub fn key_at(value: impl Into<String>, pressed_at: DateTime<Utc>) -> Self {
        Self::Key {
            value: value.into(),
            pressed_at: Some(pressed_at),
        }
    }
}

/// Final state handed back when a run reaches `Idle`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub aborted: bool,
    pub results: Vec<BlockResult>,
    pub submission: SubmissionStatus,
    pub redirect_to: Option<String>,
}

pub struct ExperimentStateMachine<C, A, N, R>
where
    C: Clock,
    A: ResultsApi,
    N: Notifier,
    R: Rng,
{
    experiment: Arc<Experiment>,
    config: RunnerConfig,
    clock: C,
    rng: R,
    timers: TimerService,
    submission: SubmissionManager<A, N>,
    run: ExperimentRun,
    events_tx: mpsc::UnboundedSender<ExperimentEvent>,
    events_rx: mpsc::UnboundedReceiver<ExperimentEvent>,
    snapshots: watch::Sender<Snapshot>,
}

impl<C, A, N, R> ExperimentStateMachine<C, A, N, R>
where
    C: Clock,
    A: ResultsApi,
    N: Notifier,
    R: Rng,
{
    pub fn new(
        experiment: impl Into<Arc<Experiment>>,
        config: RunnerConfig,
        clock: C,
        rng: R,
        submission: SubmissionManager<A, N>,
    ) -> Self {
        let experiment = experiment.into();
        let run = ExperimentRun::new(experiment.schedule());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(Snapshot::capture(&experiment, &run));

        Self {
            experiment,
            config,
            clock,
            rng,
            timers: TimerService::new(),
            submission,
            run,
            events_tx,
            events_rx,
            snapshots,
        }
    }

    /// Handle for the view to push commands into the machine.
    pub fn sender(&self) -> mpsc::UnboundedSender<ExperimentEvent> {
        self.events_tx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn run_state(&self) -> &ExperimentRun {
        &self.run
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Processes events until the run reaches its terminal phase.
    pub async fn run(mut self) -> RunReport {
        info!(
            experiment = %self.experiment.code,
            blocks = self.run.schedule.len(),
            "experiment loaded"
        );
        while !self.run.phase.is_terminal() {
            if !self.step().await {
                break;
            }
        }
        self.into_report()
    }

    /// Waits for one event and handles it. Returns false if the event
    /// channel is closed.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    pub async fn handle_event(&mut self, event: ExperimentEvent) -> bool {
        match (self.run.phase, event) {
            (RunPhase::StartingExperiment, ExperimentEvent::StartPressed) => {
                self.begin();
                true
            }
            (_, ExperimentEvent::Key { value, pressed_at }) => self.record_key(&value, pressed_at),
            (_, ExperimentEvent::TimerTick {
                generation,
                remaining,
            }) => self.on_tick(generation, remaining),
            (_, ExperimentEvent::TimerExpired { generation }) => self.on_expired(generation),
            (phase, ExperimentEvent::SubmitPressed) if phase.accepts_submission() => {
                self.submit_results().await;
                true
            }
            (RunPhase::AwaitingSurvey, ExperimentEvent::SurveyCompleted(answers)) => {
                self.submit_survey(answers).await;
                true
            }
            (phase, ExperimentEvent::Abort) if !phase.is_terminal() => {
                self.abort();
                true
            }
            (phase, event) => {
                debug!(?phase, ?event, "event ignored");
                false
            }
        }
    }

    fn transition(&mut self, to: RunPhase) {
        debug!(from = ?self.run.phase, to = ?to, "phase change");
        self.run.phase = to;
        self.publish();
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(Snapshot::capture(&self.experiment, &self.run));
    }

    fn start_timer(&mut self, duration: Duration) {
        let generation = self.run.next_timer_generation();
        let tick_tx = self.events_tx.clone();
        let expire_tx = self.events_tx.clone();
        let handle = self.timers.start_countdown(
            duration,
            move |remaining| {
                let _ = tick_tx.send(ExperimentEvent::TimerTick {
                    generation,
                    remaining,
                });
            },
            move || {
                let _ = expire_tx.send(ExperimentEvent::TimerExpired { generation });
            },
        );
        self.run.arm_timer(generation, handle, whole_secs(duration));
    }

    fn begin(&mut self) {
        info!(experiment = %self.experiment.code, "experiment started");
        self.transition(RunPhase::WaitingStart);
        if self.config.start_countdown_secs > 0 {
            self.start_timer(Duration::from_secs(self.config.start_countdown_secs));
            self.transition(RunPhase::ShowingCountdown);
        } else {
            self.start_block();
        }
    }

    fn record_key(&mut self, key: &str, pressed_at: Option<DateTime<Utc>>) -> bool {
        if !self.run.phase.allows_input() {
            debug!(key, phase = ?self.run.phase, "stray key ignored");
            return false;
        }
        let stamp = pressed_at.unwrap_or_else(|| self.clock.now());
        let recorded = self.run.recorder.record_key(key, stamp);
        if recorded {
            debug!(key, "key recorded");
            self.publish();
        }
        recorded
    }

    fn on_tick(&mut self, generation: u64, remaining: u64) -> bool {
        if !self.run.is_live_timer(generation) {
            debug!(generation, "stale tick dropped");
            return false;
        }
        self.run.remaining_secs = Some(remaining);
        self.publish();
        true
    }

    fn on_expired(&mut self, generation: u64) -> bool {
        if !self.run.is_live_timer(generation) {
            debug!(generation, "stale expiry dropped");
            return false;
        }
        self.run.clear_timer();
        match self.run.phase {
            RunPhase::ShowingCountdown => self.start_block(),
            RunPhase::DoingTrial => self.finish_trial(),
            RunPhase::BetweenTrials => self.next_trial(),
            RunPhase::DoingRest => self.end_block(),
            phase => {
                warn!(?phase, "timer expired in an untimed phase");
                return false;
            }
        }
        true
    }

    fn start_block(&mut self) {
        self.run.clear_timer();
        self.transition(RunPhase::StartBlock);
        let Some(block) = self.run.schedule.get(self.run.block_index).cloned() else {
            self.end_experiment();
            return;
        };

        info!(
            block = block.number,
            practice = block.is_practice(),
            policy = ?block.policy,
            "block started"
        );
        self.run.current_sequence = block.sequence.display().map(str::to_string);
        self.run.last_trial_correct = None;
        self.run.sequencer = Some(BlockSequencer::new(
            block,
            self.clock.instant(),
            self.config.elapsed_budget,
        ));
        self.next_trial();
    }

    fn next_trial(&mut self) {
        let now = self.clock.instant();
        let plan = match self.run.sequencer.as_mut() {
            Some(sequencer) => sequencer.next_trial(now, &mut self.rng, &self.config.random_alphabet),
            None => None,
        };
        let Some(plan) = plan else {
            self.start_rest();
            return;
        };

        debug!(trial = plan.index + 1, limit = ?plan.time_limit, "trial started");
        self.run.current_sequence = Some(plan.sequence.clone());
        if let Some(orphan) =
            self.run
                .recorder
                .begin_trial(plan.time_limit, plan.sequence, self.clock.now())
        {
            warn!(keys = orphan.keypresses().len(), "trial left open was discarded");
        }
        self.start_timer(plan.time_limit);
        self.transition(RunPhase::DoingTrial);
    }

    fn finish_trial(&mut self) {
        let Some(trial) = self.run.recorder.end_trial() else {
            warn!("trial timer expired without an open trial");
            self.next_trial();
            return;
        };
        if self.experiment.with_feedback {
            self.run.last_trial_correct = Some(trial.is_correct());
        }
        info!(
            keys = trial.keypresses().len(),
            correct = trial.is_correct(),
            completion = ?trial.completion_time(),
            "trial finished"
        );

        let now = self.clock.instant();
        let pause = match self.run.sequencer.as_mut() {
            Some(sequencer) => {
                sequencer.finish_trial(trial);
                let pause = sequencer.block().inter_trial;
                (!pause.is_zero() && sequencer.has_more(now)).then_some(pause)
            }
            None => None,
        };

        match pause {
            Some(pause) => {
                self.start_timer(pause);
                self.transition(RunPhase::BetweenTrials);
            }
            None => self.next_trial(),
        }
    }

    fn start_rest(&mut self) {
        self.run.clear_timer();
        self.transition(RunPhase::StartRest);
        let rest = self
            .run
            .current_block()
            .map_or(Duration::ZERO, |b| b.rest);
        if rest.is_zero() {
            self.end_block();
        } else {
            debug!(?rest, "rest started");
            self.start_timer(rest);
            self.transition(RunPhase::DoingRest);
        }
    }

    fn end_block(&mut self) {
        self.run.clear_timer();
        self.transition(RunPhase::EndBlock);
        if let Some(sequencer) = self.run.sequencer.take() {
            let number = sequencer.block().number;
            let trials = sequencer.completed();
            match sequencer.into_result() {
                Some(result) => {
                    info!(block = number, trials, "block completed");
                    self.run.results.push(result);
                }
                None => info!(trials, "practice completed, results discarded"),
            }
        }

        self.run.block_index += 1;
        if self.run.block_index < self.run.schedule.len() {
            self.start_block();
        } else {
            self.end_experiment();
        }
    }

    fn end_experiment(&mut self) {
        self.run.clear_timer();
        self.run.current_sequence = None;
        self.transition(RunPhase::EndExperiment);
        info!(blocks = self.run.results.len(), "experiment finished");
        self.transition(RunPhase::WaitSendData);
        if self.config.auto_submit {
            let _ = self.events_tx.send(ExperimentEvent::SubmitPressed);
        }
    }

    async fn submit_results(&mut self) {
        let outcome = self
            .submission
            .submit_results(
                &mut self.run.submission,
                &self.experiment.code,
                &self.run.results,
                self.experiment.subject_code.as_ref(),
                self.config.timezone_offset_secs(),
            )
            .await;

        match outcome {
            Ok(SubmitOutcome::Sent(_)) | Ok(SubmitOutcome::AlreadySent) => {
                if self.experiment.with_end_survey {
                    self.transition(RunPhase::AwaitingSurvey);
                } else {
                    self.finish(None);
                }
            }
            // Stay in WaitSendData; the subject may try again.
            Err(_) => self.publish(),
        }
    }

    async fn submit_survey(&mut self, answers: serde_json::Value) {
        let Some(subject) = self.run.submission.subject_code().cloned() else {
            warn!("survey submitted before results were accepted");
            return;
        };
        match self
            .submission
            .submit_survey(&self.experiment.code, &subject, answers)
            .await
        {
            Ok(receipt) => self.finish(receipt.redirect),
            Err(_) => self.publish(),
        }
    }

    fn finish(&mut self, redirect: Option<String>) {
        self.run.clear_timer();
        let target = redirect.unwrap_or_else(|| self.config.landing_url.clone());
        info!(redirect = %target, "run complete");
        self.run.redirect_to = Some(target);
        self.transition(RunPhase::Idle);
    }

    fn abort(&mut self) {
        self.run.clear_timer();
        if let Some(trial) = self.run.recorder.end_trial() {
            debug!(keys = trial.keypresses().len(), "open trial dropped on abort");
        }
        warn!(phase = ?self.run.phase, "experiment aborted");
        self.run.aborted = true;
        self.submission
            .notifier()
            .notify(Notification::info("Experiment aborted"));
        self.transition(RunPhase::Idle);
    }

    pub fn into_report(self) -> RunReport {
        RunReport {
            aborted: self.run.aborted,
            results: self.run.results,
            submission: self.run.submission,
            redirect_to: self.run.redirect_to,
        }
    }
}
