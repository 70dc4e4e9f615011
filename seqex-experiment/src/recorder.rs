use std::time::Duration;

use chrono::{DateTime, Utc};
use seqex_core::{OpenTrial, Trial};

/// Captures keypresses for the one trial that is open, if any.
#[derive(Debug, Default)]
pub struct TrialRecorder {
    open: Option<OpenTrial>,
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new trial. A trial still open at this point is finalized and
    /// handed back rather than lost.
    pub fn begin_trial(
        &mut self,
        time_limit: Duration,
        sequence: String,
        now: DateTime<Utc>,
    ) -> Option<Trial> {
        let previous = self.end_trial();
        self.open = Some(OpenTrial::new(now, time_limit, sequence));
        previous
    }

    /// Appends a keypress to the open trial. Returns false, and changes
    /// nothing, when no trial is open.
    pub fn record_key(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        match self.open.as_mut() {
            Some(trial) => {
                trial.push(key.to_string(), now.max(trial.started_at()));
                true
            }
            None => false,
        }
    }

    pub fn end_trial(&mut self) -> Option<Trial> {
        self.open.take().map(OpenTrial::finish)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Keys captured so far in the open trial.
    pub fn key_count(&self) -> usize {
        self.open.as_ref().map_or(0, |t| t.keypresses().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn records_keys_in_call_order() {
        let mut recorder = TrialRecorder::new();
        assert!(recorder.begin_trial(Duration::from_secs(5), "12".into(), at(100)).is_none());

        let keys = ["1", "2", "2", "Backspace", "1"];
        for (i, key) in keys.iter().enumerate() {
            assert!(recorder.record_key(key, at(200 + i as i64)));
        }
        let trial = recorder.end_trial().unwrap();

        assert_eq!(trial.keypresses().len(), keys.len());
        for (press, key) in trial.keypresses().iter().zip(keys) {
            assert_eq!(press.value, key);
            assert!(press.timestamp >= trial.started_at());
        }
        assert!(!recorder.is_open());
    }

    #[test]
    fn stray_keys_are_ignored() {
        let mut recorder = TrialRecorder::new();
        assert!(!recorder.record_key("x", at(0)));
        assert!(recorder.end_trial().is_none());

        recorder.begin_trial(Duration::from_secs(1), "1".into(), at(0));
        recorder.record_key("1", at(10));
        let trial = recorder.end_trial().unwrap();

        assert!(!recorder.record_key("late", at(20)));
        assert_eq!(trial.keypresses().len(), 1);
    }

    #[test]
    fn stamps_are_never_before_trial_start() {
        let mut recorder = TrialRecorder::new();
        recorder.begin_trial(Duration::from_secs(1), "1".into(), at(500));
        recorder.record_key("1", at(499));
        let trial = recorder.end_trial().unwrap();
        assert_eq!(trial.keypresses()[0].timestamp, at(500));
    }

    #[test]
    fn reopening_hands_back_the_open_trial() {
        let mut recorder = TrialRecorder::new();
        recorder.begin_trial(Duration::from_secs(1), "1".into(), at(0));
        recorder.record_key("1", at(1));
        assert_eq!(recorder.key_count(), 1);

        let previous = recorder
            .begin_trial(Duration::from_secs(1), "2".into(), at(2))
            .unwrap();
        assert_eq!(previous.sequence(), "1");
        assert_eq!(recorder.key_count(), 0);
    }
}
