use axum::routing::post;
use axum::Router;

use crate::handlers::hooks;
use crate::state::AppState;

/// Inbound VCS notifications.
///
/// ```text
/// POST /hooks/post-receive          -> post_receive
/// POST /events/repository-created   -> repository_created
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hooks/post-receive", post(hooks::post_receive))
        .route("/events/repository-created", post(hooks::repository_created))
}
