pub mod error;
pub mod experiment;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use error::BootstrapError;
pub use experiment::{
    Block, BlockKind, Bootstrap, Experiment, ExperimentCode, PracticeConfig, ScheduledBlock,
    SubjectCode, TerminationPolicy,
};
pub use phase::RunPhase;
pub use stimulus::{DEFAULT_ALPHABET, SequenceSpec};
pub use trial::{BlockResult, Keypress, OpenTrial, Trial};
