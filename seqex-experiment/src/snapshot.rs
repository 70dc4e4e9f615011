use seqex_core::{Experiment, RunPhase, SubjectCode};
use serde::Serialize;

use crate::run::ExperimentRun;

/// What a view needs to draw the current state of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub phase: RunPhase,
    /// 1-based main block number; 0 while practicing or before the first block.
    pub block_num: usize,
    pub total_blocks: usize,
    pub practice: bool,
    pub sequence: Option<String>,
    /// 1-based number of the current (or last) trial in the block.
    pub trial_num: usize,
    pub trials_left: Option<usize>,
    pub remaining_seconds: Option<u64>,
    pub keys_in_trial: usize,
    pub last_trial_correct: Option<bool>,
    pub correctly_sent: bool,
    pub failed_attempts: u32,
    pub subject_code: Option<SubjectCode>,
    pub redirect_to: Option<String>,
}

impl Snapshot {
    pub fn capture(experiment: &Experiment, run: &ExperimentRun) -> Self {
        let block = run.current_block();
        let sequencer = run.sequencer.as_ref();
        Self {
            phase: run.phase,
            block_num: block.map_or(0, |b| b.number),
            total_blocks: experiment.main_block_count(),
            practice: block.is_some_and(|b| b.is_practice()),
            sequence: run.current_sequence.clone(),
            trial_num: sequencer.map_or(0, |s| s.issued()),
            trials_left: sequencer.and_then(|s| s.trials_left()),
            remaining_seconds: run
                .remaining_secs
                .filter(|_| run.phase.is_timed()),
            keys_in_trial: run.recorder.key_count(),
            last_trial_correct: run.last_trial_correct,
            correctly_sent: run.submission.correctly_sent(),
            failed_attempts: run.submission.failed_attempts(),
            subject_code: run.submission.subject_code().cloned(),
            redirect_to: run.redirect_to.clone(),
        }
    }
}
