pub mod hooks;
pub mod jobs;
pub mod repositories;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Parse a JSON body that was read as raw bytes (for signature checks).
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid payload: {e}")))
}
