//! Recovery-run history entity.

use lyra_core::recovery::RecoverySummary;
use lyra_core::types::{from_millis, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One completed startup recovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryRun {
    pub id: i64,
    pub started_at: Timestamp,
    pub summary: RecoverySummary,
}

#[derive(Debug, FromRow)]
pub(crate) struct RecoveryRunRow {
    pub id: i64,
    pub started_at_ms: i64,
    pub duration_ms: i64,
    pub resumed: i64,
    pub cleaned: i64,
    pub verified: i64,
    pub failed: i64,
    pub dead_lettered: i64,
    pub deferred: i64,
    pub discarded: i64,
    pub stale_cleared: i64,
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl From<RecoveryRunRow> for RecoveryRun {
    fn from(row: RecoveryRunRow) -> Self {
        Self {
            id: row.id,
            started_at: from_millis(row.started_at_ms),
            summary: RecoverySummary {
                resumed: count(row.resumed),
                cleaned: count(row.cleaned),
                verified: count(row.verified),
                failed: count(row.failed),
                dead_lettered: count(row.dead_lettered),
                deferred: count(row.deferred),
                discarded: count(row.discarded),
                stale_cleared: u64::try_from(row.stale_cleared).unwrap_or(0),
                duration_ms: u64::try_from(row.duration_ms).unwrap_or(0),
            },
        }
    }
}
