use std::time::Duration;

use thiserror::Error;

/// Failure of the AI dependency.
///
/// Every variant is a transient external failure from the pipeline's point of
/// view: callers fall back to a deterministic algorithm instead of failing.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI generator is not configured")]
    Unavailable,

    #[error("AI call timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed AI response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Transport(e.to_string())
    }
}
