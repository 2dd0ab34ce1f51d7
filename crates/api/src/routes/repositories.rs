use axum::routing::get;
use axum::Router;

use crate::handlers::repositories;
use crate::state::AppState;

/// ```text
/// GET /repositories?prefix=&repositories=&projects=   -> provision_repositories
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/repositories", get(repositories::provision_repositories))
}
