use seqex_core::DEFAULT_ALPHABET;
use serde::{Deserialize, Serialize};

/// What happens to the trial in flight when a time-budgeted block runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElapsedBudgetMode {
    /// Trials always run their full limit; the budget is checked between trials.
    #[default]
    FinishTrial,
    /// The last trial's limit is clamped to what is left of the budget.
    CutShort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Length of the 3-2-1 countdown before the first block; 0 skips it.
    pub start_countdown_secs: u64,
    pub elapsed_budget: ElapsedBudgetMode,
    /// Send results as soon as the last block ends instead of waiting for
    /// the subject.
    pub auto_submit: bool,
    pub random_alphabet: String,
    pub landing_url: String,
    /// Overrides the local UTC offset reported with the results.
    pub timezone_offset_secs: Option<i32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            start_countdown_secs: 3,
            elapsed_budget: ElapsedBudgetMode::FinishTrial,
            auto_submit: false,
            random_alphabet: DEFAULT_ALPHABET.to_string(),
            landing_url: "/".to_string(),
            timezone_offset_secs: None,
        }
    }
}

impl RunnerConfig {
    pub fn timezone_offset_secs(&self) -> i32 {
        self.timezone_offset_secs
            .unwrap_or_else(local_timezone_offset_secs)
    }
}

/// UTC minus local time in seconds, positive west of Greenwich.
pub fn local_timezone_offset_secs() -> i32 {
    -chrono::Local::now().offset().local_minus_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_local_offset() {
        let config = RunnerConfig {
            timezone_offset_secs: Some(-7200),
            ..RunnerConfig::default()
        };
        assert_eq!(config.timezone_offset_secs(), -7200);
    }

    #[test]
    fn defaults_match_the_web_client() {
        let config = RunnerConfig::default();
        assert_eq!(config.start_countdown_secs, 3);
        assert_eq!(config.elapsed_budget, ElapsedBudgetMode::FinishTrial);
        assert!(!config.auto_submit);
    }
}
