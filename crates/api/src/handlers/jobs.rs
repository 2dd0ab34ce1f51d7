//! Handlers for the `/jobs` resource.

use axum::extract::{Path, State};
use axum::Json;
use toolz_worker::{JobId, JobOutcome, JobSummary};

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /jobs
///
/// Jobs that are registered or running; finished jobs are gone.
pub async fn list_jobs(State(state): State<AppState>) -> Json<DataResponse<Vec<JobSummary>>> {
    Json(DataResponse {
        data: state.registry.pending(),
    })
}

/// POST /jobs/{id}/run
///
/// Execution callback for an external scheduler: claims, runs, and evicts the
/// job, answering with its outcome. Unknown ids report `No such job`.
///
/// The run is detached from the request, so a request timeout or a dropped
/// connection loses the response but never interrupts the job.
pub async fn run_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<DataResponse<JobOutcome>> {
    let outcome = state.registry.run_detached(JobId::from_raw(id)).await;
    Json(DataResponse { data: outcome })
}
