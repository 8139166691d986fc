//! Uploaded design artifacts.

use hdlbridge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `artifacts` table.
///
/// `filename` doubles as the job correlation key; `status` holds the most
/// recent job status recorded for it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Artifact {
    pub id: DbId,
    pub user_id: DbId,
    pub filename: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub status: Option<String>,
    pub status_updated_at: Option<Timestamp>,
    /// Set on every upload, including re-uploads of the same filename.
    pub uploaded_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording an upload.
#[derive(Debug)]
pub struct CreateArtifact {
    pub user_id: DbId,
    pub filename: String,
    pub storage_key: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}
