//! Repository for the `recovery_runs` table.

use lyra_core::recovery::RecoverySummary;
use lyra_core::types::{to_millis, Timestamp};

use crate::models::recovery_run::{RecoveryRun, RecoveryRunRow};
use crate::DbPool;

/// Column list for `recovery_runs` queries.
const COLUMNS: &str = "\
    id, started_at_ms, duration_ms, resumed, cleaned, verified, \
    failed, dead_lettered, deferred, discarded, stale_cleared";

/// Provides query operations for the recovery-run history.
pub struct RecoveryRunRepo;

impl RecoveryRunRepo {
    /// Append a completed pass. Returns the new row id.
    pub async fn insert(
        pool: &DbPool,
        started_at: Timestamp,
        summary: &RecoverySummary,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO recovery_runs \
                 (started_at_ms, duration_ms, resumed, cleaned, verified, \
                  failed, dead_lettered, deferred, discarded, stale_cleared) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(to_millis(started_at))
        .bind(i64::try_from(summary.duration_ms).unwrap_or(i64::MAX))
        .bind(summary.resumed)
        .bind(summary.cleaned)
        .bind(summary.verified)
        .bind(summary.failed)
        .bind(summary.dead_lettered)
        .bind(summary.deferred)
        .bind(summary.discarded)
        .bind(i64::try_from(summary.stale_cleared).unwrap_or(i64::MAX))
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The most recent passes, newest first.
    pub async fn list_recent(pool: &DbPool, limit: i64) -> Result<Vec<RecoveryRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recovery_runs \
             ORDER BY started_at_ms DESC, id DESC \
             LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, RecoveryRunRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(RecoveryRun::from).collect())
    }
}
