pub mod api;
pub mod error;
pub mod manager;
pub mod notify;

pub use api::{
    ApiConfig, CreateTrialsRequest, CreateTrialsResponse, HttpResultsApi, ResultsApi,
    SurveyReceipt, SurveyRequest,
};
pub use error::{ApiError, SubmissionError};
pub use manager::{SubmissionManager, SubmissionStatus, SubmitOutcome};
pub use notify::{MemoryNotifier, Notification, NotificationKind, Notifier};
