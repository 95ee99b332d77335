//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::workflow::outcome::WorkflowStep;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Kaiten error: {0}")]
    Kaiten(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: WorkflowStep, reason: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap a gateway failure as the failure of a workflow step
    pub fn step(step: WorkflowStep, err: AppError) -> Self {
        let reason = match err {
            AppError::Kaiten(msg) => msg,
            other => other.to_string(),
        };
        AppError::StepFailed { step, reason }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Kaiten(e) => {
                tracing::error!("Kaiten error: {}", e);
                (StatusCode::BAD_GATEWAY, format!("Kaiten error: {}", e))
            }
            AppError::StepFailed { step, reason } => {
                tracing::error!(step = %step, "Workflow step failed: {}", reason);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.clone()),
            AppError::PreconditionFailed(e) => (StatusCode::CONFLICT, e.clone()),
            AppError::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
