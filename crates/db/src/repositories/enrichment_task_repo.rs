//! Repository for the `enrichment_tasks` table, the persistent task queue
//! consumed by the metadata enrichment workers.

use chrono::Utc;
use lyra_core::types::to_millis;

use crate::models::enrichment_task::{EnrichmentTask, EnrichmentTaskRow, TASK_STATUS_QUEUED};
use crate::DbPool;

/// Column list for `enrichment_tasks` queries.
const COLUMNS: &str = "id, track_id, context_id, status, created_at_ms";

/// Provides queue operations for enrichment tasks.
pub struct EnrichmentTaskRepo;

impl EnrichmentTaskRepo {
    /// Queue enrichment for `track_id` on behalf of `context_id`.
    ///
    /// A second call with the same pair is a no-op. Returns `true` if a new
    /// task was queued.
    pub async fn enqueue(
        pool: &DbPool,
        track_id: &str,
        context_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO enrichment_tasks (track_id, context_id, status, created_at_ms) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (track_id, context_id) DO NOTHING",
        )
        .bind(track_id)
        .bind(context_id)
        .bind(TASK_STATUS_QUEUED)
        .bind(to_millis(Utc::now()))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tasks still waiting to be picked up, oldest first.
    pub async fn list_queued(pool: &DbPool) -> Result<Vec<EnrichmentTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM enrichment_tasks \
             WHERE status = ?1 \
             ORDER BY created_at_ms ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, EnrichmentTaskRow>(&query)
            .bind(TASK_STATUS_QUEUED)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(EnrichmentTask::from).collect())
    }
}
