//! Handler for the bulk provisioning trigger.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use toolz_core::error::CoreError;
use toolz_pipeline::BulkProvisioningJob;
use validator::Validate;

use crate::error::AppResult;
use crate::state::AppState;

/// Query parameters of `GET /repositories`.
#[derive(Debug, Deserialize, Validate)]
pub struct ProvisionQuery {
    /// Leading part of every project key.
    #[validate(length(min = 1, max = 64))]
    pub prefix: String,
    /// Repositories per project.
    pub repositories: u32,
    pub projects: u32,
}

/// GET /repositories?prefix=&repositories=&projects=
///
/// Registers a bulk provisioning job and returns 202 with an empty body once
/// it is handed to the scheduler. Progress is only visible in the logs.
pub async fn provision_repositories(
    State(state): State<AppState>,
    Query(query): Query<ProvisionQuery>,
) -> AppResult<StatusCode> {
    query.validate().map_err(CoreError::from)?;

    let job = BulkProvisioningJob::new(
        Arc::clone(&state.vcs),
        query.prefix.clone(),
        query.repositories,
        query.projects,
    );

    match state.registry.register(Arc::new(job)).await {
        Some(job_id) => tracing::info!(
            job_id = %job_id,
            prefix = %query.prefix,
            projects = query.projects,
            repositories_per_project = query.repositories,
            "Bulk provisioning accepted",
        ),
        // Already logged by the registry; the caller still gets 202.
        None => tracing::warn!(prefix = %query.prefix, "Bulk provisioning was not scheduled"),
    }

    Ok(StatusCode::ACCEPTED)
}
