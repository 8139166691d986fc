use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::artifacts;
use crate::state::AppState;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Routes mounted at `/artifacts`. All require a bearer token.
///
/// ```text
/// GET    /                      -> list
/// POST   /                      -> upload (multipart, field "file")
/// GET    /{filename}/download   -> download
/// DELETE /{filename}            -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(artifacts::list)
                .post(artifacts::upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/{filename}/download", get(artifacts::download))
        .route("/{filename}", delete(artifacts::delete))
}
