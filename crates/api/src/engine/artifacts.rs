//! Artifact lookups used by the job engine.

use async_trait::async_trait;
use hdlbridge_db::repositories::ArtifactRepo;
use hdlbridge_db::DbPool;

/// Resolves job ids to stored source files and records job status.
#[async_trait]
pub trait ArtifactLocator: Send + Sync {
    /// URL of the most recent upload named `job_id`, if any.
    async fn find_source_url(&self, job_id: &str) -> Result<Option<String>, sqlx::Error>;

    /// Record the latest status for `job_id`.
    async fn update_status(&self, job_id: &str, status: &str) -> Result<(), sqlx::Error>;
}

/// [`ArtifactLocator`] over the `artifacts` table.
pub struct PgArtifactLocator {
    pool: DbPool,
}

impl PgArtifactLocator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactLocator for PgArtifactLocator {
    async fn find_source_url(&self, job_id: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(ArtifactRepo::find_by_filename(&self.pool, job_id)
            .await?
            .map(|artifact| artifact.url))
    }

    async fn update_status(&self, job_id: &str, status: &str) -> Result<(), sqlx::Error> {
        let rows = ArtifactRepo::update_status(&self.pool, job_id, status).await?;
        if rows == 0 {
            tracing::debug!(job_id, status, "No artifact rows to update");
        }
        Ok(())
    }
}
