//! Render API error types.

use thiserror::Error;

/// Result type alias for Render API calls.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("response missing serviceDetails.numInstances")]
    MissingInstanceCount,

    #[error("invalid instance count {0}")]
    InvalidInstanceCount(f64),
}
