use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A single key press captured during a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypress {
    pub value: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Keypress {
    /// Named keys ("Enter", "Shift") are reported with their name; only
    /// single characters count towards the typed sequence.
    pub fn is_printable(&self) -> bool {
        self.value.chars().count() == 1
    }
}

/// Trial being recorded. Only the recorder holds one of these; it becomes a
/// [`Trial`] once the time limit expires.
#[derive(Debug)]
pub struct OpenTrial {
    started_at: DateTime<Utc>,
    time_limit: Duration,
    sequence: String,
    keypresses: Vec<Keypress>,
}

impl OpenTrial {
    pub fn new(started_at: DateTime<Utc>, time_limit: Duration, sequence: String) -> Self {
        Self {
            started_at,
            time_limit,
            sequence,
            keypresses: Vec::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn push(&mut self, value: String, timestamp: DateTime<Utc>) {
        self.keypresses.push(Keypress { value, timestamp });
    }

    pub fn keypresses(&self) -> &[Keypress] {
        &self.keypresses
    }

    pub fn finish(self) -> Trial {
        Trial {
            started_at: self.started_at,
            time_limit: self.time_limit,
            sequence: self.sequence,
            keypresses: self.keypresses,
        }
    }
}

/// Finalized trial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    time_limit: Duration,
    sequence: String,
    keypresses: Vec<Keypress>,
}

impl Trial {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Target sequence shown during the trial.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn keypresses(&self) -> &[Keypress] {
        &self.keypresses
    }

    /// What the subject actually typed.
    pub fn input_sequence(&self) -> String {
        self.keypresses
            .iter()
            .filter(|k| k.is_printable())
            .map(|k| k.value.as_str())
            .collect()
    }

    pub fn is_correct(&self) -> bool {
        self.input_sequence() == self.sequence
    }

    /// Time from trial start to the last key press, if any.
    pub fn completion_time(&self) -> Option<Duration> {
        let last = self.keypresses.last()?;
        (last.timestamp - self.started_at).to_std().ok()
    }
}

/// All trials of one completed block run.
///
/// On the wire a block is a bare array of its trials, in the order they ran;
/// each trial carries the block id and repetition it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockResult {
    pub block_id: Option<u64>,
    pub repetition: u32,
    pub trials: Vec<Trial>,
}

#[derive(Serialize)]
struct BlockTrial<'a> {
    block_id: Option<u64>,
    repetition: u32,
    #[serde(flatten)]
    trial: &'a Trial,
}

impl Serialize for BlockResult {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(self.trials.iter().map(|trial| BlockTrial {
            block_id: self.block_id,
            repetition: self.repetition,
            trial,
        }))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
