//! Handlers for notifications sent by the VCS service.
//!
//! Both accept the raw body so the optional `X-Hub-Signature` can be checked
//! before anything is parsed.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use toolz_core::refs::RefChange;
use toolz_core::types::Repository;

use crate::error::AppResult;
use crate::handlers::parse_json;
use crate::response::DataResponse;
use crate::signature;
use crate::state::AppState;

/// A `repo:refs_changed` delivery.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefsChangedPayload {
    #[serde(default)]
    pub event_key: Option<String>,
    pub repository: Repository,
    #[serde(default)]
    pub changes: Vec<RefChange>,
}

/// A repository creation notification.
#[derive(Debug, Deserialize)]
pub struct RepositoryCreatedPayload {
    pub repository: Repository,
}

#[derive(Debug, Serialize)]
pub struct RepositoryCreatedResponse {
    pub hook_enabled: bool,
}

/// POST /hooks/post-receive
///
/// Disables the guard hook, queues one task per matching branch, and returns
/// 202 with the batch split. Task outcomes are only logged.
pub async fn post_receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    signature::authorize(&headers, &body, state.config.webhook_secret.as_deref())?;
    let payload: RefsChangedPayload = parse_json(&body)?;

    tracing::debug!(
        event_key = payload.event_key.as_deref().unwrap_or("unknown"),
        repository = %payload.repository.full_name(),
        changes = payload.changes.len(),
        "Received ref changes",
    );

    let summary = state
        .orchestrator
        .handle_ref_changes(&payload.repository, &payload.changes)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: summary })))
}

/// POST /events/repository-created
pub async fn repository_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<DataResponse<RepositoryCreatedResponse>>> {
    signature::authorize(&headers, &body, state.config.webhook_secret.as_deref())?;
    let payload: RepositoryCreatedPayload = parse_json(&body)?;

    let hook_enabled = state
        .orchestrator
        .handle_repository_created(&payload.repository)
        .await?;

    Ok(Json(DataResponse {
        data: RepositoryCreatedResponse { hook_enabled },
    }))
}
