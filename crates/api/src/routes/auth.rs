//! Route definitions for the `/auth` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /register                           -> register
/// POST /login                              -> login
/// POST /forgot-password/security-question  -> security_question
/// POST /forgot-password/reset              -> reset_password
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route(
            "/forgot-password/security-question",
            post(auth::security_question),
        )
        .route("/forgot-password/reset", post(auth::reset_password))
}
