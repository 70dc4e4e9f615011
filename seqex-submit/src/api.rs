use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use seqex_core::{ExperimentCode, SubjectCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

const CREATE_TRIALS_PATH: &str = "api/create_trials";
const CSRF_HEADER: &str = "X-CSRFTOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTrialsRequest {
    /// JSON-encoded list of block results.
    pub experiment_trials: String,
    pub experiment: ExperimentCode,
    pub timezone_offset_sec: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_code: Option<SubjectCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTrialsResponse {
    pub subject_code: SubjectCode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyRequest {
    pub questionnaire: serde_json::Value,
    pub subject_code: SubjectCode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SurveyReceipt {
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Server endpoints the runner reports to.
#[async_trait]
pub trait ResultsApi: Send + Sync {
    async fn create_trials(
        &self,
        request: &CreateTrialsRequest,
    ) -> Result<CreateTrialsResponse, ApiError>;

    async fn end_survey(
        &self,
        experiment: &ExperimentCode,
        request: &SurveyRequest,
    ) -> Result<SurveyReceipt, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub csrf_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            csrf_token: None,
        }
    }
}

pub struct HttpResultsApi {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl HttpResultsApi {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            csrf_token: config.csrf_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, ApiError> {
        let url = self.url(path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%url, %status, "api response");

        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl ResultsApi for HttpResultsApi {
    async fn create_trials(
        &self,
        request: &CreateTrialsRequest,
    ) -> Result<CreateTrialsResponse, ApiError> {
        let body = self.post_json(CREATE_TRIALS_PATH, request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn end_survey(
        &self,
        experiment: &ExperimentCode,
        request: &SurveyRequest,
    ) -> Result<SurveyReceipt, ApiError> {
        let path = format!("api/experiment/end_survey/{experiment}/");
        let body = self.post_json(&path, request).await?;
        // The survey endpoint may answer with an empty or non-JSON body.
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
