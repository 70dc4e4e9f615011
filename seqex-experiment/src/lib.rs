pub mod config;
pub mod recorder;
pub mod run;
pub mod sequencer;
pub mod snapshot;
pub mod state;

pub use config::{ElapsedBudgetMode, RunnerConfig, local_timezone_offset_secs};
pub use recorder::TrialRecorder;
pub use run::ExperimentRun;
pub use sequencer::{BlockSequencer, TrialPlan};
pub use snapshot::Snapshot;
pub use state::{ExperimentEvent, ExperimentStateMachine, RunReport};
