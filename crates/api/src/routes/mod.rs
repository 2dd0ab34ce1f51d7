pub mod health;
pub mod hooks;
pub mod jobs;
pub mod repositories;

use axum::Router;

use crate::state::AppState;

/// Prefix the bulk provisioning endpoint was historically served under.
pub const LEGACY_REST_PREFIX: &str = "/rest/toolz/1.0";

/// Build the route tree.
///
/// ```text
/// /health                                 health
/// /repositories                           bulk provisioning trigger
/// /rest/toolz/1.0/repositories            same, legacy path
/// /hooks/post-receive                     ref batch trigger
/// /events/repository-created              hook enablement trigger
/// /jobs                                   pending jobs
/// /jobs/{id}/run                          job execution callback
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(repositories::router())
        .nest(LEGACY_REST_PREFIX, repositories::router())
        .merge(hooks::router())
        .nest("/jobs", jobs::router())
}
