//! Persistent enrichment task queue entity.

use lyra_core::types::{from_millis, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Status of a task that has not been picked up yet.
pub const TASK_STATUS_QUEUED: &str = "queued";

/// A queued unit of metadata enrichment work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentTask {
    pub id: i64,
    pub track_id: String,
    /// Correlates the task with whatever submitted it (a checkpoint id on recovery).
    pub context_id: String,
    pub status: String,
    pub created_at: Timestamp,
}

#[derive(Debug, FromRow)]
pub(crate) struct EnrichmentTaskRow {
    pub id: i64,
    pub track_id: String,
    pub context_id: String,
    pub status: String,
    pub created_at_ms: i64,
}

impl From<EnrichmentTaskRow> for EnrichmentTask {
    fn from(row: EnrichmentTaskRow) -> Self {
        Self {
            id: row.id,
            track_id: row.track_id,
            context_id: row.context_id,
            status: row.status,
            created_at: from_millis(row.created_at_ms),
        }
    }
}
