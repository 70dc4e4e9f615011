//! Experiment definitions and the bootstrap payload they are built from.
//!
//! The payload mirrors what the server renders into the experiment page:
//! an experiment record, its block rows and an optional subject code. It is
//! parsed once, validated, and turned into an immutable [`Experiment`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;
use crate::stimulus::SequenceSpec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentCode(String);

impl ExperimentCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the server assigns to a subject on the first accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectCode(String);

impl SubjectCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a block stops issuing trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    FixedTrialCount(usize),
    MaxElapsedTime(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: Option<u64>,
    /// 1-based position in the experiment.
    pub position: usize,
    pub policy: TerminationPolicy,
    pub sequence: SequenceSpec,
    pub time_limit: Duration,
    pub rest: Duration,
    /// Pause between consecutive trials of the block.
    pub inter_trial: Duration,
    pub repetitions: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeConfig {
    pub trials: usize,
    pub sequence: SequenceSpec,
    pub time_limit: Duration,
    pub rest: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub code: ExperimentCode,
    pub name: String,
    pub instructions: Option<String>,
    pub blocks: Vec<Block>,
    pub practice: Option<PracticeConfig>,
    pub with_feedback: bool,
    pub with_end_survey: bool,
    pub subject_code: Option<SubjectCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Practice,
    Main { block_id: Option<u64>, repetition: u32 },
}

/// One entry of the run order: the practice block first (if any), then every
/// main block once per repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBlock {
    pub kind: BlockKind,
    /// 1-based number among main block runs, 0 for practice.
    pub number: usize,
    pub policy: TerminationPolicy,
    pub sequence: SequenceSpec,
    pub time_limit: Duration,
    pub rest: Duration,
    pub inter_trial: Duration,
}

impl ScheduledBlock {
    pub fn is_practice(&self) -> bool {
        matches!(self.kind, BlockKind::Practice)
    }
}

impl Experiment {
    pub fn from_json(raw: &str) -> Result<Self, BootstrapError> {
        let bootstrap: Bootstrap = serde_json::from_str(raw)?;
        Self::try_from(bootstrap)
    }

    pub fn schedule(&self) -> Vec<ScheduledBlock> {
        let mut schedule = Vec::new();
        if let Some(practice) = &self.practice {
            schedule.push(ScheduledBlock {
                kind: BlockKind::Practice,
                number: 0,
                policy: TerminationPolicy::FixedTrialCount(practice.trials),
                sequence: practice.sequence.clone(),
                time_limit: practice.time_limit,
                rest: practice.rest,
                inter_trial: Duration::ZERO,
            });
        }

        let mut number = 0;
        for block in &self.blocks {
            for repetition in 0..block.repetitions {
                number += 1;
                schedule.push(ScheduledBlock {
                    kind: BlockKind::Main {
                        block_id: block.id,
                        repetition,
                    },
                    number,
                    policy: block.policy,
                    sequence: block.sequence.clone(),
                    time_limit: block.time_limit,
                    rest: block.rest,
                    inter_trial: block.inter_trial,
                });
            }
        }
        schedule
    }

    /// Number of main block runs, repetitions included.
    pub fn main_block_count(&self) -> usize {
        self.blocks.iter().map(|b| b.repetitions as usize).sum()
    }
}

/// Page bootstrap payload as rendered by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Bootstrap {
    pub experiment: ExperimentRecord,
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub subject_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentRecord {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub resting_time: Option<u64>,
    #[serde(default)]
    pub with_practice_trials: bool,
    #[serde(default, alias = "practice_trials")]
    pub num_practice_trials: Option<u64>,
    #[serde(default)]
    pub practice_is_random_seq: Option<bool>,
    #[serde(default)]
    pub practice_seq_length: Option<u64>,
    #[serde(default)]
    pub practice_seq: Option<String>,
    #[serde(default)]
    pub practice_trial_time: Option<u64>,
    #[serde(default)]
    pub practice_rest_time: Option<u64>,
    #[serde(default)]
    pub with_feedback: bool,
    #[serde(default)]
    pub with_end_survey: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default, alias = "time_per_trial")]
    pub max_time_per_trial: Option<u64>,
    #[serde(default)]
    pub resting_time: Option<u64>,
    #[serde(default, rename = "type", alias = "block_type")]
    pub block_type: Option<String>,
    #[serde(default)]
    pub num_trials: Option<u64>,
    #[serde(default)]
    pub max_time: Option<u64>,
    #[serde(default)]
    pub sec_until_next: Option<u64>,
    #[serde(default, alias = "is_random_sequence")]
    pub is_random: bool,
    #[serde(default)]
    pub seq_length: Option<u64>,
    #[serde(default)]
    pub num_repetitions: Option<u64>,
}

impl TryFrom<Bootstrap> for Experiment {
    type Error = BootstrapError;

    fn try_from(bootstrap: Bootstrap) -> Result<Self, Self::Error> {
        let record = bootstrap.experiment;
        if record.code.trim().is_empty() {
            return Err(BootstrapError::EmptyCode);
        }
        if bootstrap.blocks.is_empty() {
            return Err(BootstrapError::NoBlocks);
        }

        let default_rest = record.resting_time.unwrap_or(0);
        let blocks = bootstrap
            .blocks
            .iter()
            .enumerate()
            .map(|(idx, raw)| parse_block(idx + 1, raw, default_rest))
            .collect::<Result<Vec<_>, _>>()?;

        let practice = if record.with_practice_trials {
            Some(parse_practice(&record)?)
        } else {
            None
        };

        Ok(Experiment {
            code: ExperimentCode::new(record.code.trim()),
            name: record.name,
            instructions: record.instructions,
            blocks,
            practice,
            with_feedback: record.with_feedback,
            with_end_survey: record.with_end_survey,
            subject_code: bootstrap
                .subject_code
                .filter(|s| !s.is_empty())
                .map(SubjectCode::new),
        })
    }
}

/// Longest duration a single timed phase may be configured with.
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;
/// Upper bound for trial counts, repetitions and sequence lengths.
pub const MAX_COUNT: u64 = 10_000;

fn parse_block(position: usize, raw: &BlockRecord, default_rest: u64) -> Result<Block, BootstrapError> {
    let positive = |value: Option<u64>, field: &'static str| -> Result<u64, BootstrapError> {
        match value {
            None => Err(BootstrapError::MissingField {
                block: position,
                field,
            }),
            Some(0) => Err(BootstrapError::ZeroValue {
                block: position,
                field,
            }),
            Some(v) => Ok(v),
        }
    };
    let out_of_range = |field: &'static str, value: u64, max: u64| BootstrapError::OutOfRange {
        block: position,
        field,
        value,
        max,
    };
    let seconds = |value: u64, field: &'static str| -> Result<Duration, BootstrapError> {
        if value > MAX_DURATION_SECS {
            return Err(out_of_range(field, value, MAX_DURATION_SECS));
        }
        Ok(Duration::from_secs(value))
    };
    let count = |value: u64, field: &'static str| -> Result<usize, BootstrapError> {
        if value > MAX_COUNT {
            return Err(out_of_range(field, value, MAX_COUNT));
        }
        usize::try_from(value).map_err(|_| out_of_range(field, value, MAX_COUNT))
    };

    let kind = match raw.block_type.as_deref() {
        Some(kind) => kind.to_string(),
        None if raw.num_trials.is_some() => "num_trials".to_string(),
        None if raw.max_time.is_some() => "max_time".to_string(),
        None => {
            return Err(BootstrapError::MissingField {
                block: position,
                field: "type",
            });
        }
    };
    let policy = match kind.as_str() {
        "num_trials" => TerminationPolicy::FixedTrialCount(count(
            positive(raw.num_trials, "num_trials")?,
            "num_trials",
        )?),
        "max_time" => TerminationPolicy::MaxElapsedTime(seconds(
            positive(raw.max_time, "max_time")?,
            "max_time",
        )?),
        other => {
            return Err(BootstrapError::UnknownBlockType {
                block: position,
                kind: other.to_string(),
            });
        }
    };

    let sequence = if raw.is_random {
        SequenceSpec::Random {
            length: count(positive(raw.seq_length, "seq_length")?, "seq_length")?,
        }
    } else {
        match raw.sequence.as_deref().map(str::trim) {
            None => {
                return Err(BootstrapError::MissingField {
                    block: position,
                    field: "sequence",
                });
            }
            Some("") => return Err(BootstrapError::EmptySequence { block: position }),
            Some(seq) => SequenceSpec::Fixed(seq.to_string()),
        }
    };

    let repetitions = match raw.num_repetitions {
        None => 1,
        Some(_) => {
            let reps = positive(raw.num_repetitions, "num_repetitions")?;
            let reps = count(reps, "num_repetitions")?;
            u32::try_from(reps)
                .map_err(|_| out_of_range("num_repetitions", reps as u64, MAX_COUNT))?
        }
    };

    Ok(Block {
        id: raw.id,
        position,
        policy,
        sequence,
        time_limit: seconds(
            positive(raw.max_time_per_trial, "max_time_per_trial")?,
            "max_time_per_trial",
        )?,
        rest: seconds(raw.resting_time.unwrap_or(default_rest), "resting_time")?,
        inter_trial: seconds(raw.sec_until_next.unwrap_or(0), "sec_until_next")?,
        repetitions,
    })
}

fn parse_practice(record: &ExperimentRecord) -> Result<PracticeConfig, BootstrapError> {
    let positive = |value: Option<u64>, field: &'static str| match value {
        Some(v) if v > 0 => Ok(v),
        _ => Err(BootstrapError::InvalidPractice { field }),
    };
    let bounded = |value: u64, field: &'static str, max: u64| -> Result<u64, BootstrapError> {
        if value > max {
            return Err(BootstrapError::PracticeOutOfRange { field, value, max });
        }
        Ok(value)
    };
    let count = |value: u64, field: &'static str| -> Result<usize, BootstrapError> {
        let value = bounded(value, field, MAX_COUNT)?;
        usize::try_from(value).map_err(|_| BootstrapError::PracticeOutOfRange {
            field,
            value,
            max: MAX_COUNT,
        })
    };
    let seconds = |value: u64, field: &'static str| {
        bounded(value, field, MAX_DURATION_SECS).map(Duration::from_secs)
    };

    let fixed = record
        .practice_seq
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let is_random = record.practice_is_random_seq.unwrap_or(fixed.is_none());
    let sequence = if is_random {
        SequenceSpec::Random {
            length: count(
                positive(record.practice_seq_length, "practice_seq_length")?,
                "practice_seq_length",
            )?,
        }
    } else {
        let seq = fixed.ok_or(BootstrapError::InvalidPractice {
            field: "practice_seq",
        })?;
        SequenceSpec::Fixed(seq.to_string())
    };

    Ok(PracticeConfig {
        trials: count(
            positive(record.num_practice_trials, "num_practice_trials")?,
            "num_practice_trials",
        )?,
        sequence,
        time_limit: seconds(
            positive(record.practice_trial_time, "practice_trial_time")?,
            "practice_trial_time",
        )?,
        rest: seconds(record.practice_rest_time.unwrap_or(0), "practice_rest_time")?,
    })
}
