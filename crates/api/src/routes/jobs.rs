use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST /{job_id}/process  -> process (waits for the completion notification)
/// POST /{job_id}/submit   -> submit (fire-and-forget)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{job_id}/process", post(jobs::process))
        .route("/{job_id}/submit", post(jobs::submit))
}
