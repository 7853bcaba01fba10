use thiserror::Error;

use crate::utils::truncate_string;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Fetch failed: {0}")]
    Other(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = truncate_string(body, MAX_ERROR_BODY_LENGTH);
        match status.as_u16() {
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            code => FetchError::Status {
                status: code,
                body: truncated,
            },
        }
    }
}
