use seqex_core::{BlockResult, RunPhase, ScheduledBlock};
use seqex_submit::SubmissionStatus;
use seqex_timing::TimerHandle;
use tracing::debug;

use crate::recorder::TrialRecorder;
use crate::sequencer::BlockSequencer;

/// Mutable state of one experiment run. Owned by the state machine; nothing
/// else holds a reference to it between events.
#[derive(Debug, Default)]
pub struct ExperimentRun {
    pub(crate) phase: RunPhase,
    pub(crate) schedule: Vec<ScheduledBlock>,
    pub(crate) block_index: usize,
    pub(crate) sequencer: Option<BlockSequencer>,
    pub(crate) recorder: TrialRecorder,
    timer: Option<TimerHandle>,
    timer_generation: u64,
    pub(crate) remaining_secs: Option<u64>,
    pub(crate) current_sequence: Option<String>,
    pub(crate) last_trial_correct: Option<bool>,
    pub(crate) results: Vec<BlockResult>,
    pub(crate) submission: SubmissionStatus,
    pub(crate) redirect_to: Option<String>,
    pub(crate) aborted: bool,
}

impl ExperimentRun {
    pub fn new(schedule: Vec<ScheduledBlock>) -> Self {
        Self {
            schedule,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn block_index(&self) -> usize {
        self.block_index
    }

    pub fn current_block(&self) -> Option<&ScheduledBlock> {
        self.sequencer.as_ref().map(BlockSequencer::block)
    }

    /// Completed main blocks, in completion order.
    pub fn results(&self) -> &[BlockResult] {
        &self.results
    }

    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    pub fn trial_open(&self) -> bool {
        self.recorder.is_open()
    }

    pub fn has_live_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Cancels the live timer, if any, and invalidates its pending events.
    pub(crate) fn clear_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!(timer = %timer.id(), "timer released");
            timer.cancel();
        }
        self.timer_generation += 1;
        self.remaining_secs = None;
    }

    /// Generation the next timer's events will carry.
    pub(crate) fn next_timer_generation(&mut self) -> u64 {
        self.clear_timer();
        self.timer_generation
    }

    pub(crate) fn arm_timer(&mut self, generation: u64, handle: TimerHandle, remaining: u64) {
        debug_assert_eq!(generation, self.timer_generation);
        self.timer = Some(handle);
        self.remaining_secs = Some(remaining);
    }

    /// True when `generation` belongs to the timer currently held.
    pub(crate) fn is_live_timer(&self, generation: u64) -> bool {
        self.timer.is_some() && generation == self.timer_generation
    }
}
