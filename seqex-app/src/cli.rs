use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use seqex_core::DEFAULT_ALPHABET;
use seqex_experiment::{ElapsedBudgetMode, RunnerConfig};
use seqex_submit::ApiConfig;

#[derive(Parser, Debug)]
#[command(name = "seqex", author, version, about = "Keystroke sequence experiment runner")]
pub struct Cli {
    /// Experiment definition as served to the participant page
    #[arg(long, env = "SEQEX_BOOTSTRAP", value_name = "FILE")]
    pub bootstrap: PathBuf,

    #[arg(long, env = "SEQEX_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    #[arg(long, env = "SEQEX_CSRF_TOKEN")]
    pub csrf_token: Option<String>,

    /// Per-request timeout for the results server
    #[arg(long, env = "SEQEX_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Countdown before the first block, 0 to skip
    #[arg(long, env = "SEQEX_COUNTDOWN_SECS", default_value_t = 3)]
    pub countdown_secs: u64,

    /// Clamp the last trial of a timed block to what is left of its budget
    #[arg(long, env = "SEQEX_CUT_SHORT")]
    pub cut_short: bool,

    /// Send results without waiting for the participant to confirm
    #[arg(long, env = "SEQEX_AUTO_SUBMIT")]
    pub auto_submit: bool,

    /// Symbols random sequences are drawn from
    #[arg(long, env = "SEQEX_ALPHABET", default_value = DEFAULT_ALPHABET)]
    pub alphabet: String,

    #[arg(long, env = "SEQEX_LANDING_URL", default_value = "/")]
    pub landing_url: String,

    /// JSON answers sent as the end survey questionnaire
    #[arg(long, env = "SEQEX_SURVEY_ANSWERS", value_name = "FILE")]
    pub survey_answers: Option<PathBuf>,

    #[arg(long, env = "SEQEX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "SEQEX_LOG_FILE", default_value = "seqex.log")]
    pub log_file: PathBuf,
}

impl Cli {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            start_countdown_secs: self.countdown_secs,
            elapsed_budget: if self.cut_short {
                ElapsedBudgetMode::CutShort
            } else {
                ElapsedBudgetMode::FinishTrial
            },
            auto_submit: self.auto_submit,
            random_alphabet: self.alphabet.clone(),
            landing_url: self.landing_url.clone(),
            timezone_offset_secs: None,
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            csrf_token: self.csrf_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runner_defaults() {
        let cli = Cli::try_parse_from(["seqex", "--bootstrap", "exp.json"]).unwrap();
        let config = cli.runner_config();
        let defaults = RunnerConfig::default();

        assert_eq!(config.start_countdown_secs, defaults.start_countdown_secs);
        assert_eq!(config.elapsed_budget, defaults.elapsed_budget);
        assert_eq!(config.random_alphabet, defaults.random_alphabet);
        assert_eq!(config.landing_url, defaults.landing_url);
        assert!(!config.auto_submit);
        assert_eq!(cli.api_config().request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "seqex",
            "--bootstrap",
            "exp.json",
            "--cut-short",
            "--auto-submit",
            "--countdown-secs",
            "0",
            "--csrf-token",
            "tok",
        ])
        .unwrap();
        let config = cli.runner_config();

        assert_eq!(config.elapsed_budget, ElapsedBudgetMode::CutShort);
        assert!(config.auto_submit);
        assert_eq!(config.start_countdown_secs, 0);
        assert_eq!(cli.api_config().csrf_token.as_deref(), Some("tok"));
    }

    #[test]
    fn bootstrap_is_required() {
        assert!(Cli::try_parse_from(["seqex"]).is_err());
    }
}
