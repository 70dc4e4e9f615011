use thiserror::Error;

/// Bootstrap data that cannot describe a runnable experiment.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("malformed bootstrap payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("experiment code is empty")]
    EmptyCode,

    #[error("experiment has no blocks")]
    NoBlocks,

    #[error("block {block}: missing `{field}`")]
    MissingField { block: usize, field: &'static str },

    #[error("block {block}: `{field}` must be at least 1")]
    ZeroValue { block: usize, field: &'static str },

    #[error("block {block}: unknown block type `{kind}`")]
    UnknownBlockType { block: usize, kind: String },

    #[error("block {block}: fixed sequence is empty")]
    EmptySequence { block: usize },

    #[error("block {block}: `{field}` is {value}, at most {max} allowed")]
    OutOfRange {
        block: usize,
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("practice `{field}` is {value}, at most {max} allowed")]
    PracticeOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("practice trials enabled but `{field}` is missing or zero")]
    InvalidPractice { field: &'static str },
}
