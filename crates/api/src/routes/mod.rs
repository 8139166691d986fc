pub mod artifacts;
pub mod auth;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/forgot-password/security-question          fetch question (public)
/// /auth/forgot-password/reset                      reset password (public)
///
/// /artifacts                                       list, upload (auth required)
/// /artifacts/{filename}                            delete (auth required)
/// /artifacts/{filename}/download                   download (auth required)
///
/// /jobs/{job_id}/process                           trigger and wait (POST)
/// /jobs/{job_id}/submit                            trigger only (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/artifacts", artifacts::router())
        .nest("/jobs", jobs::router())
}
