//! Handlers for the `/jobs` resource.
//!
//! A job id is the filename of an uploaded artifact. `process` triggers the
//! build and holds the request open until the completion notification
//! arrives or the wait budget runs out; `submit` only triggers.

use axum::extract::{Path, State};
use axum::Json;
use hdlbridge_broker::NotificationMessage;
use hdlbridge_core::credentials::validate_filename;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// Body of a successful `POST /jobs/{job_id}/process`.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub message: &'static str,
    pub file_url: String,
    pub notification: NotificationMessage,
}

/// Body of a successful `POST /jobs/{job_id}/submit`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    pub file_url: String,
    pub processing_result: serde_json::Value,
}

/// POST /api/v1/jobs/{job_id}/process
pub async fn process(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<ProcessResponse>> {
    validate_filename(&job_id)?;
    let outcome = state.dispatcher.process_job(&job_id).await?;

    Ok(Json(ProcessResponse {
        message: "File processed successfully",
        file_url: outcome.file_url,
        notification: outcome.notification,
    }))
}

/// POST /api/v1/jobs/{job_id}/submit
pub async fn submit(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<SubmitResponse>> {
    validate_filename(&job_id)?;
    let outcome = state.dispatcher.submit_job(&job_id).await?;

    Ok(Json(SubmitResponse {
        message: "File sent for processing",
        file_url: outcome.file_url,
        processing_result: outcome.processing_result,
    }))
}
