//! Handlers for the `/artifacts` resource (uploaded design files).

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hdlbridge_core::credentials::validate_filename;
use hdlbridge_core::error::CoreError;
use hdlbridge_db::models::artifact::{Artifact, CreateArtifact};
use hdlbridge_db::repositories::ArtifactRepo;
use hdlbridge_storage::upload_key;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// POST /api/v1/artifacts
///
/// Store the `file` field of a multipart upload and record it. Uploading
/// the same filename again replaces the previous version.
pub async fn upload(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<Artifact>>)> {
    let mut upload: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .ok_or_else(|| AppError::BadRequest("File field has no filename".into()))?
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((filename, content_type, data));
        break;
    }

    let (filename, content_type, data) = upload
        .ok_or_else(|| AppError::BadRequest(format!("Missing multipart field '{FILE_FIELD}'")))?;
    validate_filename(&filename)?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let key = upload_key(user.user_id, &filename);
    let size_bytes = data.len() as i64;
    state
        .storage
        .put(&key, data.to_vec(), content_type.as_deref())
        .await?;

    let artifact = ArtifactRepo::upsert(
        &state.pool,
        &CreateArtifact {
            user_id: user.user_id,
            filename,
            url: state.storage.public_url(&key),
            storage_key: key,
            content_type,
            size_bytes,
        },
    )
    .await?;

    tracing::info!(
        user_id = user.user_id,
        filename = %artifact.filename,
        size_bytes,
        "Artifact uploaded",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: artifact })))
}

/// GET /api/v1/artifacts
pub async fn list(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Artifact>>>> {
    let artifacts = ArtifactRepo::list_for_user(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: artifacts }))
}

/// GET /api/v1/artifacts/{filename}/download
pub async fn download(
    user: AuthUser,
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let artifact = find_owned(&state, &user, &filename).await?;
    let object = state.storage.get(&artifact.storage_key).await?;

    let content_type = object
        .content_type
        .or(artifact.content_type)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    Ok((
        [
            (CONTENT_TYPE, content_type),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.filename),
            ),
        ],
        object.bytes,
    )
        .into_response())
}

/// DELETE /api/v1/artifacts/{filename}
pub async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<StatusCode> {
    let artifact = find_owned(&state, &user, &filename).await?;

    state.storage.delete(&artifact.storage_key).await?;
    ArtifactRepo::delete_for_user(&state.pool, user.user_id, &artifact.filename).await?;

    tracing::info!(user_id = user.user_id, filename = %artifact.filename, "Artifact deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_owned(state: &AppState, user: &AuthUser, filename: &str) -> AppResult<Artifact> {
    validate_filename(filename)?;
    ArtifactRepo::find_for_user(&state.pool, user.user_id, filename)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Artifact", filename)))
}
