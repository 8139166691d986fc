//! Repository for the `artifacts` table.

use hdlbridge_core::types::DbId;
use sqlx::PgPool;

use crate::models::artifact::{Artifact, CreateArtifact};

/// Column list for `artifacts` queries.
const COLUMNS: &str = "\
    id, user_id, filename, storage_key, url, content_type, size_bytes, \
    status, status_updated_at, uploaded_at, created_at, updated_at";

/// Provides query operations for uploaded artifacts.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Record an upload. Re-uploading the same filename for the same user
    /// replaces the stored location and clears any previous job status.
    pub async fn upsert(pool: &PgPool, input: &CreateArtifact) -> Result<Artifact, sqlx::Error> {
        let query = format!(
            "INSERT INTO artifacts (user_id, filename, storage_key, url, content_type, size_bytes) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_artifacts_user_filename DO UPDATE SET \
                 storage_key = EXCLUDED.storage_key, \
                 url = EXCLUDED.url, \
                 content_type = EXCLUDED.content_type, \
                 size_bytes = EXCLUDED.size_bytes, \
                 status = NULL, \
                 status_updated_at = NULL, \
                 uploaded_at = NOW(), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(input.user_id)
            .bind(&input.filename)
            .bind(&input.storage_key)
            .bind(&input.url)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .fetch_one(pool)
            .await
    }

    /// Find the most recently uploaded artifact with `filename`, across users.
    pub async fn find_by_filename(
        pool: &PgPool,
        filename: &str,
    ) -> Result<Option<Artifact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts \
             WHERE filename = $1 \
             ORDER BY uploaded_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(filename)
            .fetch_optional(pool)
            .await
    }

    /// Find one user's artifact by filename.
    pub async fn find_for_user(
        pool: &PgPool,
        user_id: DbId,
        filename: &str,
    ) -> Result<Option<Artifact>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM artifacts WHERE user_id = $1 AND filename = $2");
        sqlx::query_as::<_, Artifact>(&query)
            .bind(user_id)
            .bind(filename)
            .fetch_optional(pool)
            .await
    }

    /// List a user's artifacts, newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Artifact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts WHERE user_id = $1 ORDER BY uploaded_at DESC, id DESC"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Record the latest job status for every artifact named `filename`.
    ///
    /// Returns the number of rows touched.
    pub async fn update_status(
        pool: &PgPool,
        filename: &str,
        status: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE artifacts \
             SET status = $2, status_updated_at = NOW(), updated_at = NOW() \
             WHERE filename = $1",
        )
        .bind(filename)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete one user's artifact row. Returns `false` if none matched.
    pub async fn delete_for_user(
        pool: &PgPool,
        user_id: DbId,
        filename: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM artifacts WHERE user_id = $1 AND filename = $2")
            .bind(user_id)
            .bind(filename)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
