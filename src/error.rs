use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::terminal::controller::TerminalError;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Log in first.")]
    NotAuthenticated,
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TerminalError> for ApiError {
    fn from(e: TerminalError) -> Self {
        match e {
            TerminalError::NotAuthenticated => Self::NotAuthenticated,
            e @ TerminalError::InvalidCredentials { .. } => Self::InvalidCredentials(e.to_string()),
            TerminalError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotAuthenticated | Self::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
