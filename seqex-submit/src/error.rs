use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Network(#[from] ApiError),

    #[error("could not encode trials: {0}")]
    Encode(#[source] serde_json::Error),
}
