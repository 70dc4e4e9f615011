use seqex_core::{BlockResult, ExperimentCode, SubjectCode};
use tracing::{debug, info, warn};

use crate::api::{CreateTrialsRequest, ResultsApi, SurveyReceipt, SurveyRequest};
use crate::error::SubmissionError;
use crate::notify::{Notification, Notifier};

/// Delivery bookkeeping for one run. Only [`SubmissionManager`] changes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionStatus {
    correctly_sent: bool,
    failed_attempts: u32,
    subject_code: Option<SubjectCode>,
}

impl SubmissionStatus {
    pub fn correctly_sent(&self) -> bool {
        self.correctly_sent
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Set by the first accepted upload.
    pub fn subject_code(&self) -> Option<&SubjectCode> {
        self.subject_code.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Sent(SubjectCode),
    /// An earlier call already delivered the results; nothing was sent.
    AlreadySent,
}

pub struct SubmissionManager<A, N> {
    api: A,
    notifier: N,
}

impl<A: ResultsApi, N: Notifier> SubmissionManager<A, N> {
    pub fn new(api: A, notifier: N) -> Self {
        Self { api, notifier }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Uploads the block results once. Failures are counted and reported to
    /// the subject; retrying is left to the caller.
    pub async fn submit_results(
        &self,
        status: &mut SubmissionStatus,
        experiment: &ExperimentCode,
        blocks: &[BlockResult],
        subject_hint: Option<&SubjectCode>,
        timezone_offset_sec: i32,
    ) -> Result<SubmitOutcome, SubmissionError> {
        if status.correctly_sent {
            debug!(%experiment, "results already delivered, skipping");
            return Ok(SubmitOutcome::AlreadySent);
        }

        info!(
            %experiment,
            blocks = blocks.len(),
            attempt = status.failed_attempts + 1,
            "sending results"
        );
        match self
            .post_results(experiment, blocks, subject_hint, timezone_offset_sec)
            .await
        {
            Ok(subject) => {
                status.correctly_sent = true;
                status.subject_code = Some(subject.clone());
                info!(%experiment, %subject, "results accepted");
                self.notifier
                    .notify(Notification::success("Success sending data"));
                Ok(SubmitOutcome::Sent(subject))
            }
            Err(err) => {
                status.failed_attempts += 1;
                warn!(
                    %experiment,
                    failed_attempts = status.failed_attempts,
                    error = %err,
                    "sending results failed"
                );
                self.notifier.notify(Notification::error(
                    "Error sending data",
                    format!("Please try again. {err}"),
                ));
                Err(err)
            }
        }
    }

    async fn post_results(
        &self,
        experiment: &ExperimentCode,
        blocks: &[BlockResult],
        subject_hint: Option<&SubjectCode>,
        timezone_offset_sec: i32,
    ) -> Result<SubjectCode, SubmissionError> {
        let experiment_trials = serde_json::to_string(blocks).map_err(SubmissionError::Encode)?;
        let request = CreateTrialsRequest {
            experiment_trials,
            experiment: experiment.clone(),
            timezone_offset_sec,
            subject_code: subject_hint.cloned(),
        };
        let response = self.api.create_trials(&request).await?;
        Ok(response.subject_code)
    }

    pub async fn submit_survey(
        &self,
        experiment: &ExperimentCode,
        subject: &SubjectCode,
        questionnaire: serde_json::Value,
    ) -> Result<SurveyReceipt, SubmissionError> {
        let request = SurveyRequest {
            questionnaire,
            subject_code: subject.clone(),
        };
        match self.api.end_survey(experiment, &request).await {
            Ok(receipt) => {
                info!(%experiment, %subject, "survey accepted");
                self.notifier
                    .notify(Notification::success("Thank you for participating"));
                Ok(receipt)
            }
            Err(err) => {
                warn!(%experiment, %subject, error = %err, "sending survey failed");
                self.notifier.notify(Notification::error(
                    "Error sending survey",
                    format!("Please try again. {err}"),
                ));
                Err(err.into())
            }
        }
    }
}
