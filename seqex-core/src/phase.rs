use serde::{Deserialize, Serialize};

/// Phases an experiment run moves through, from the start screen to the
/// terminal state.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    StartingExperiment,
    WaitingStart,
    ShowingCountdown,
    StartBlock,
    DoingTrial,
    BetweenTrials,
    StartRest,
    DoingRest,
    EndBlock,
    EndExperiment,
    WaitSendData,
    AwaitingSurvey,
    Idle,
}

impl RunPhase {
    /// Only an open trial accepts keypresses.
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::DoingTrial)
    }

    /// Phases that hold a live countdown.
    pub fn is_timed(&self) -> bool {
        matches!(
            self,
            Self::ShowingCountdown | Self::DoingTrial | Self::BetweenTrials | Self::DoingRest
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn accepts_submission(&self) -> bool {
        matches!(self, Self::EndExperiment | Self::WaitSendData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_trials_take_input() {
        assert!(RunPhase::DoingTrial.allows_input());
        assert!(!RunPhase::DoingRest.allows_input());
        assert!(!RunPhase::BetweenTrials.allows_input());
        assert!(!RunPhase::StartingExperiment.allows_input());
    }

    #[test]
    fn input_and_submission_never_overlap() {
        let all = [
            RunPhase::StartingExperiment,
            RunPhase::WaitingStart,
            RunPhase::ShowingCountdown,
            RunPhase::StartBlock,
            RunPhase::DoingTrial,
            RunPhase::BetweenTrials,
            RunPhase::StartRest,
            RunPhase::DoingRest,
            RunPhase::EndBlock,
            RunPhase::EndExperiment,
            RunPhase::WaitSendData,
            RunPhase::AwaitingSurvey,
            RunPhase::Idle,
        ];
        for phase in all {
            assert!(!(phase.allows_input() && phase.accepts_submission()), "{phase:?}");
            assert!(!(phase.is_timed() && phase.is_terminal()), "{phase:?}");
        }
    }
}
