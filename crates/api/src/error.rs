use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use toolz_core::error::CoreError;
use toolz_pipeline::PipelineError;
use toolz_vcs::VcsError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and the VCS and pipeline errors a
/// trigger can surface synchronously. Implements [`IntoResponse`] to produce
/// consistent `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A VCS call made before the response was sent failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            AppError::Vcs(err) => vcs_failure(err),
            AppError::Pipeline(PipelineError::Vcs(err)) => vcs_failure(err),
            err @ AppError::Pipeline(PipelineError::Dispatch { .. }) => {
                tracing::warn!(error = %err, "Ref batch rejected");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SHUTTING_DOWN",
                    err.to_string(),
                )
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Upstream failures map to 502; the body carries the upstream message.
fn vcs_failure(err: &VcsError) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %err, "VCS call failed");
    (StatusCode::BAD_GATEWAY, "VCS_ERROR", err.to_string())
}
