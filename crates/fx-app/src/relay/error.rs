use crate::generator::backend::RelayError;
use crate::relay::schemas::ErrorBody;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream responded with HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream unreachable: {0}")]
    Unreachable(String),
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::MissingApiKey | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ServerError::Unreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Relay request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Relay request rejected");
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<RelayError> for ServerError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Status { status, body } => ServerError::Upstream { status, body },
            RelayError::Transport(e) | RelayError::InvalidBody(e) => ServerError::Unreachable(e),
        }
    }
}
