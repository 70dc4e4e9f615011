use std::time::Duration;

use rand::Rng;
use seqex_core::{BlockKind, BlockResult, ScheduledBlock, TerminationPolicy, Trial};
use tokio::time::Instant;
use tracing::warn;

use crate::config::ElapsedBudgetMode;

/// Next trial to run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialPlan {
    /// 0-based trial number within the block.
    pub index: usize,
    pub time_limit: Duration,
    pub sequence: String,
}

/// Issues the trials of one block until its termination policy is met and
/// collects the finished ones.
#[derive(Debug)]
pub struct BlockSequencer {
    block: ScheduledBlock,
    started: Instant,
    mode: ElapsedBudgetMode,
    issued: usize,
    in_flight: bool,
    trials: Vec<Trial>,
}

impl BlockSequencer {
    pub fn new(block: ScheduledBlock, started: Instant, mode: ElapsedBudgetMode) -> Self {
        Self {
            block,
            started,
            mode,
            issued: 0,
            in_flight: false,
            trials: Vec::new(),
        }
    }

    pub fn block(&self) -> &ScheduledBlock {
        &self.block
    }

    /// Trials issued so far, the running one included.
    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn completed(&self) -> usize {
        self.trials.len()
    }

    /// Trials still to come after the current one, when the block is count based.
    pub fn trials_left(&self) -> Option<usize> {
        match self.block.policy {
            TerminationPolicy::FixedTrialCount(n) => Some(n.saturating_sub(self.issued)),
            TerminationPolicy::MaxElapsedTime(_) => None,
        }
    }

    /// Whether [`next_trial`](Self::next_trial) would issue a trial at `now`.
    pub fn has_more(&self, now: Instant) -> bool {
        self.next_limit(now).is_some()
    }

    fn next_limit(&self, now: Instant) -> Option<Duration> {
        match self.block.policy {
            TerminationPolicy::FixedTrialCount(n) => {
                (self.issued < n).then_some(self.block.time_limit)
            }
            TerminationPolicy::MaxElapsedTime(budget) => {
                let elapsed = now.saturating_duration_since(self.started);
                let left = budget.checked_sub(elapsed).filter(|d| !d.is_zero())?;
                Some(match self.mode {
                    ElapsedBudgetMode::FinishTrial => self.block.time_limit,
                    ElapsedBudgetMode::CutShort => self.block.time_limit.min(left),
                })
            }
        }
    }

    /// Plans the next trial, or `None` once the block is complete.
    pub fn next_trial<R: Rng>(
        &mut self,
        now: Instant,
        rng: &mut R,
        alphabet: &str,
    ) -> Option<TrialPlan> {
        if self.in_flight {
            warn!(issued = self.issued, "next trial requested before the current one finished");
            return None;
        }
        let time_limit = self.next_limit(now)?;
        let plan = TrialPlan {
            index: self.issued,
            time_limit,
            sequence: self.block.sequence.next_sequence(rng, alphabet),
        };
        self.issued += 1;
        self.in_flight = true;
        Some(plan)
    }

    pub fn finish_trial(&mut self, trial: Trial) {
        self.trials.push(trial);
        self.in_flight = false;
    }

    /// Block results, or `None` for practice blocks.
    pub fn into_result(self) -> Option<BlockResult> {
        match self.block.kind {
            BlockKind::Practice => None,
            BlockKind::Main {
                block_id,
                repetition,
            } => Some(BlockResult {
                block_id,
                repetition,
                trials: self.trials,
            }),
        }
    }
}
