//! Repository for the `checkpoints` table: the checkpoint journal.
//!
//! Pure data access. Every write is a single statement keyed by id, so
//! repeating a call for the same id converges on the same row state.
//! Errors are returned to the caller untouched; a swallowed journal write
//! would break crash safety.

use chrono::Utc;
use lyra_core::checkpointing::{CheckpointStatus, OperationType};
use lyra_core::types::{from_millis, to_millis, Timestamp};

use crate::models::checkpoint::{Checkpoint, CheckpointRow, HealthSummary};
use crate::DbPool;

/// Column list for `checkpoints` queries.
const COLUMNS: &str = "\
    id, operation_type, target_path, state_payload, payload_version, \
    status, failure_count, priority, created_at_ms, last_attempt_at_ms";

/// Processing order for pending checkpoints.
const PENDING_ORDER: &str = "ORDER BY priority ASC, created_at_ms ASC, id ASC";

/// Provides the checkpoint journal operations.
pub struct CheckpointRepo;

impl CheckpointRepo {
    /// Insert a checkpoint, or update every mutable column if its id exists.
    ///
    /// `created_at` is fixed by the first insert so re-logging progress
    /// does not reset the stale clock.
    pub async fn log(pool: &DbPool, checkpoint: &Checkpoint) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO checkpoints ({COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT (id) DO UPDATE SET \
                 operation_type     = excluded.operation_type, \
                 target_path        = excluded.target_path, \
                 state_payload      = excluded.state_payload, \
                 payload_version    = excluded.payload_version, \
                 status             = excluded.status, \
                 failure_count      = excluded.failure_count, \
                 priority           = excluded.priority, \
                 last_attempt_at_ms = excluded.last_attempt_at_ms"
        );
        sqlx::query(&query)
            .bind(&checkpoint.id)
            .bind(checkpoint.operation_type.as_str())
            .bind(&checkpoint.target_path)
            .bind(&checkpoint.state_payload)
            .bind(checkpoint.payload_version)
            .bind(checkpoint.status.as_str())
            .bind(checkpoint.failure_count)
            .bind(checkpoint.priority)
            .bind(to_millis(checkpoint.created_at))
            .bind(checkpoint.last_attempt_at.map(to_millis))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Find a checkpoint by id, whatever its status.
    pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<Checkpoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM checkpoints WHERE id = ?1");
        let row = sqlx::query_as::<_, CheckpointRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(Checkpoint::from))
    }

    /// All pending checkpoints created at or before `now`, by priority then age.
    ///
    /// Dead-letter records are never returned. Checkpoints logged after
    /// `now` belong to operations that are still live in this process.
    pub async fn get_pending(pool: &DbPool, now: Timestamp) -> Result<Vec<Checkpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM checkpoints \
             WHERE status = ?1 AND created_at_ms <= ?2 \
             {PENDING_ORDER}"
        );
        let rows = sqlx::query_as::<_, CheckpointRow>(&query)
            .bind(CheckpointStatus::Pending.as_str())
            .bind(to_millis(now))
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Checkpoint::from).collect())
    }

    /// Number of pending checkpoints dated after `after`.
    ///
    /// Such rows are invisible to [`get_pending`](Self::get_pending) and the
    /// stale sweep until the wall clock reaches them.
    pub async fn count_pending_after(pool: &DbPool, after: Timestamp) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM checkpoints WHERE status = ?1 AND created_at_ms > ?2",
        )
        .bind(CheckpointStatus::Pending.as_str())
        .bind(to_millis(after))
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Pending checkpoints of one operation type, in processing order.
    ///
    /// Used by subsystems that sweep their own checkpoints at startup.
    pub async fn list_pending_by_type(
        pool: &DbPool,
        operation_type: &OperationType,
    ) -> Result<Vec<Checkpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM checkpoints \
             WHERE status = ?1 AND operation_type = ?2 \
             {PENDING_ORDER}"
        );
        let rows = sqlx::query_as::<_, CheckpointRow>(&query)
            .bind(CheckpointStatus::Pending.as_str())
            .bind(operation_type.as_str())
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Checkpoint::from).collect())
    }

    /// Dead-letter checkpoints retained for audit, newest first.
    pub async fn list_dead_letters(pool: &DbPool) -> Result<Vec<Checkpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM checkpoints \
             WHERE status = ?1 \
             ORDER BY COALESCE(last_attempt_at_ms, created_at_ms) DESC"
        );
        let rows = sqlx::query_as::<_, CheckpointRow>(&query)
            .bind(CheckpointStatus::DeadLetter.as_str())
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Checkpoint::from).collect())
    }

    /// Delete pending checkpoints older than `max_age`, without repair.
    ///
    /// Only the journal entries go; any files they point at are left alone.
    /// Returns the number of rows deleted.
    pub async fn clear_stale(pool: &DbPool, max_age: chrono::Duration) -> Result<u64, sqlx::Error> {
        Self::clear_stale_before(pool, Utc::now() - max_age).await
    }

    /// Delete pending checkpoints created strictly before `cutoff`.
    pub async fn clear_stale_before(pool: &DbPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE status = ?1 AND created_at_ms < ?2")
            .bind(CheckpointStatus::Pending.as_str())
            .bind(to_millis(cutoff))
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete a checkpoint: the operation is fully reconciled.
    ///
    /// Returns `false` if no such row existed (already completed).
    pub async fn complete(pool: &DbPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Quarantine a checkpoint. It stays for audit and is never returned by
    /// [`get_pending`](Self::get_pending) again.
    ///
    /// Returns `false` if no such row existed.
    pub async fn mark_dead_letter(pool: &DbPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE checkpoints SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(CheckpointStatus::DeadLetter.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Operator action: move a dead-letter checkpoint back to pending with a
    /// clean failure count and a fresh stale clock.
    ///
    /// Returns `false` if the id is not a dead-letter record.
    pub async fn requeue(pool: &DbPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE checkpoints \
             SET status = ?2, failure_count = 0, created_at_ms = ?4, last_attempt_at_ms = NULL \
             WHERE id = ?1 AND status = ?3",
        )
        .bind(id)
        .bind(CheckpointStatus::Pending.as_str())
        .bind(CheckpointStatus::DeadLetter.as_str())
        .bind(to_millis(Utc::now()))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Counts of recovered, dead-letter and pending checkpoints.
    ///
    /// Completed checkpoints are deleted, so `recovered` comes from the
    /// `recovery_runs` history rather than the journal itself.
    pub async fn health_summary(pool: &DbPool) -> Result<HealthSummary, sqlx::Error> {
        let (pending, dead_letter): (i64, i64) = sqlx::query_as(
            "SELECT \
                 COALESCE(SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END), 0) \
             FROM checkpoints",
        )
        .bind(CheckpointStatus::Pending.as_str())
        .bind(CheckpointStatus::DeadLetter.as_str())
        .fetch_one(pool)
        .await?;

        let (recovered, last_run_ms): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COALESCE(SUM(resumed + cleaned + verified), 0), MAX(started_at_ms) \
             FROM recovery_runs",
        )
        .fetch_one(pool)
        .await?;

        Ok(HealthSummary {
            recovered,
            dead_letter,
            pending,
            last_run_at: last_run_ms.map(from_millis),
        })
    }
}
