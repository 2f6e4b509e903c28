use crate::generator::backend::RelayError;
use fx_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("A generation job is already in progress")]
    ConcurrentJob,

    #[error("Submission failed: {0}")]
    Submission(RelayError),

    #[error("Status check failed: {0}")]
    Poll(RelayError),

    #[error("Cancellation failed: {0}")]
    Cancellation(RelayError),

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] CoreError),

    #[error("Image generation was cancelled.")]
    Canceled,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload an image or enter a prompt.")]
    EmptyRequest,

    #[error("Please set your Replicate API key in the settings.")]
    MissingCredential,
}

impl AppError {
    /// HTTP status reported by the relay, when the failure came from one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Submission(e) | Self::Poll(e) | Self::Cancellation(e) => e.status(),
            _ => None,
        }
    }

    /// Rejections leave the controller state untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ConcurrentJob)
    }
}
