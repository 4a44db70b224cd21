use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the engagement API client. None of them are retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("engagement api configuration error: {0}")]
    Config(String),
    #[error("engagement api transport error ({endpoint})")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("engagement api returned {status} for {endpoint}: {body}")]
    Remote {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("engagement api response decode error ({endpoint}): {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
    #[error("Failed to add event: {body}")]
    Rejected { body: String },
}

impl ApiError {
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            ApiError::Transport { endpoint, .. }
            | ApiError::Remote { endpoint, .. }
            | ApiError::Decode { endpoint, .. } => Some(endpoint),
            ApiError::Rejected { .. } => Some(crate::client::TRACK_ENDPOINT),
            ApiError::Config(_) => None,
        }
    }

    /// True when the HTTP exchange succeeded but the platform refused the payload.
    pub fn is_business_failure(&self) -> bool {
        matches!(self, ApiError::Rejected { .. })
    }
}
