//! Startup recovery pass.
//!
//! Runs once per process start, off the caller's task:
//!
//! 1. Sweep pending checkpoints older than the stale age, without repair.
//! 2. Fetch pending checkpoints in priority order.
//! 3. Process each one sequentially:
//!    - retries exhausted → dead-letter, no handler call
//!    - handler succeeds → delete the checkpoint
//!    - handler fails → bump the failure count and re-log; dead-letter when
//!      the bumped count reaches the threshold
//!    - download → left for the download engine's own sweep
//!    - unknown type → logged and deleted
//! 4. Publish a summary when anything was resumed or dead-lettered.
//!
//! One failing checkpoint never aborts the pass, and a failed pass never
//! prevents startup: [`RecoveryCoordinator::run`] always returns an outcome.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use lyra_core::checkpointing::{
    has_exhausted_retries, CheckpointStatus, HydrationState, OperationType, TagWriteState,
};
use lyra_core::recovery::{RecoverySummary, RepairOutcome};
use lyra_db::models::checkpoint::Checkpoint;
use lyra_db::repositories::{CheckpointRepo, RecoveryRunRepo};
use lyra_db::DbPool;
use lyra_events::{EventBus, PlatformEvent};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::RecoveryConfig;
use crate::error::RecoveryError;
use crate::handlers::{HydrationHandler, SqliteTaskQueue, TagWriteHandler, TaskQueue};

/// Checkpoints dated at most this many minutes past the pass start are not
/// reported as future-dated; they are most likely live operations.
const FUTURE_DATED_TOLERANCE_MINUTES: i64 = 1;

// ---------------------------------------------------------------------------
// RecoveryOutcome
// ---------------------------------------------------------------------------

/// How a recovery pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The pass ran to the end.
    Completed(RecoverySummary),
    /// Recovery is switched off by configuration.
    Disabled,
    /// The pass could not complete. Already logged.
    Aborted { reason: String },
}

impl RecoveryOutcome {
    /// The summary, if the pass completed.
    pub fn summary(&self) -> Option<&RecoverySummary> {
        match self {
            RecoveryOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryCoordinator
// ---------------------------------------------------------------------------

/// Drives one startup pass over the checkpoint journal.
pub struct RecoveryCoordinator<Q = SqliteTaskQueue> {
    pool: DbPool,
    event_bus: Arc<EventBus>,
    config: RecoveryConfig,
    tag_write: TagWriteHandler,
    hydration: HydrationHandler<Q>,
}

impl RecoveryCoordinator<SqliteTaskQueue> {
    /// Coordinator that re-queues hydration work on the SQLite task queue.
    pub fn new(pool: DbPool, event_bus: Arc<EventBus>, config: RecoveryConfig) -> Self {
        let queue = SqliteTaskQueue::new(pool.clone());
        Self::with_task_queue(pool, event_bus, config, queue)
    }
}

impl<Q: TaskQueue + 'static> RecoveryCoordinator<Q> {
    /// Coordinator with a caller-supplied task queue.
    pub fn with_task_queue(
        pool: DbPool,
        event_bus: Arc<EventBus>,
        config: RecoveryConfig,
        queue: Q,
    ) -> Self {
        Self {
            pool,
            event_bus,
            config,
            tag_write: TagWriteHandler::new(),
            hydration: HydrationHandler::new(queue),
        }
    }

    /// Run the pass on a background task.
    ///
    /// The returned handle always resolves to an outcome; a panic inside
    /// the pass is reported as [`RecoveryOutcome::Aborted`].
    pub fn spawn(self) -> JoinHandle<RecoveryOutcome> {
        let pass = tokio::spawn(async move { self.run().await });
        tokio::spawn(async move {
            match pass.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "Recovery task terminated abnormally");
                    RecoveryOutcome::Aborted {
                        reason: format!("recovery task terminated: {e}"),
                    }
                }
            }
        })
    }

    /// Run the pass, converting any fatal error into an outcome.
    pub async fn run(&self) -> RecoveryOutcome {
        if !self.config.enabled {
            tracing::info!("Crash recovery disabled by configuration");
            return RecoveryOutcome::Disabled;
        }

        match self.run_pass().await {
            Ok(summary) => RecoveryOutcome::Completed(summary),
            Err(e) => {
                tracing::error!(error = %e, "Recovery pass did not complete");
                RecoveryOutcome::Aborted {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run the pass and return its summary.
    ///
    /// Only the initial sweep and fetch can fail the pass; errors while
    /// processing a single checkpoint are counted and the pass continues.
    pub async fn run_pass(&self) -> Result<RecoverySummary, RecoveryError> {
        let started = Instant::now();
        let started_at = Utc::now();

        let stale_cleared = CheckpointRepo::clear_stale(&self.pool, self.config.stale_max_age()).await?;
        if stale_cleared > 0 {
            tracing::warn!(
                stale_cleared,
                max_age_hours = self.config.stale_max_age_hours,
                "Dropped stale checkpoints without repair; their files are left as found"
            );
        }

        let pending = CheckpointRepo::get_pending(&self.pool, started_at).await?;
        self.warn_future_dated(started_at).await;

        let mut summary = RecoverySummary {
            stale_cleared,
            ..Default::default()
        };

        if pending.is_empty() {
            summary.duration_ms = elapsed_ms(started);
            tracing::info!(duration_ms = summary.duration_ms, "No pending checkpoints, nothing to recover");
            if summary.changed_journal() {
                self.record_run(started_at, &summary).await;
            }
            return Ok(summary);
        }

        tracing::info!(count = pending.len(), "Recovering pending checkpoints");

        for checkpoint in pending {
            let span = tracing::info_span!(
                "recover_checkpoint",
                checkpoint_id = %checkpoint.id,
                operation_type = %checkpoint.operation_type,
            );
            self.process(checkpoint, &mut summary).instrument(span).await;
        }

        summary.duration_ms = elapsed_ms(started);

        tracing::info!(
            resumed = summary.resumed,
            cleaned = summary.cleaned,
            verified = summary.verified,
            failed = summary.failed,
            dead_lettered = summary.dead_lettered,
            deferred = summary.deferred,
            discarded = summary.discarded,
            duration_ms = summary.duration_ms,
            "Recovery pass finished"
        );

        if summary.should_notify() {
            self.event_bus.publish(PlatformEvent::recovery_completed(&summary));
        }

        if summary.changed_journal() {
            self.record_run(started_at, &summary).await;
        }
        Ok(summary)
    }

    /// Process one checkpoint. Never fails; outcomes land in `summary`.
    async fn process(&self, checkpoint: Checkpoint, summary: &mut RecoverySummary) {
        if has_exhausted_retries(checkpoint.failure_count, self.config.max_failures) {
            match CheckpointRepo::mark_dead_letter(&self.pool, &checkpoint.id).await {
                Ok(_) => {
                    summary.dead_lettered += 1;
                    self.announce_dead_letter(&checkpoint);
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(error = %e, "Failed to quarantine exhausted checkpoint");
                }
            }
            return;
        }

        let attempt = match &checkpoint.operation_type {
            OperationType::TagWrite => self.repair_tag_write(&checkpoint).await,
            OperationType::MetadataHydration => self.repair_hydration(&checkpoint).await,
            OperationType::Download => {
                summary.deferred += 1;
                tracing::debug!(
                    target_path = %checkpoint.target_path,
                    "Download checkpoint left for the download engine"
                );
                return;
            }
            OperationType::Unknown(name) => {
                tracing::warn!(
                    operation_type = %name,
                    target_path = %checkpoint.target_path,
                    "Unknown checkpoint type cannot be repaired, discarding"
                );
                match CheckpointRepo::complete(&self.pool, &checkpoint.id).await {
                    Ok(_) => summary.discarded += 1,
                    Err(e) => {
                        summary.failed += 1;
                        tracing::error!(error = %e, "Failed to discard unknown checkpoint");
                    }
                }
                return;
            }
        };

        let result = match attempt {
            Ok(outcome) => CheckpointRepo::complete(&self.pool, &checkpoint.id)
                .await
                .map(|_| outcome)
                .map_err(RecoveryError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                tracing::debug!(?outcome, "Checkpoint reconciled");
                summary.record(outcome);
            }
            Err(e) => self.record_failure(checkpoint, e, summary).await,
        }
    }

    async fn repair_tag_write(&self, checkpoint: &Checkpoint) -> Result<RepairOutcome, RecoveryError> {
        let state: TagWriteState = checkpoint.payload()?;
        self.tag_write.repair(&state).await
    }

    async fn repair_hydration(&self, checkpoint: &Checkpoint) -> Result<RepairOutcome, RecoveryError> {
        let state: HydrationState = checkpoint.payload()?;
        self.hydration.repair(&checkpoint.id, &state).await
    }

    /// Count a failed repair and write the bumped failure count back.
    ///
    /// Reaching the threshold quarantines the checkpoint in the same write.
    async fn record_failure(
        &self,
        mut checkpoint: Checkpoint,
        error: RecoveryError,
        summary: &mut RecoverySummary,
    ) {
        summary.failed += 1;
        checkpoint.failure_count += 1;
        checkpoint.last_attempt_at = Some(Utc::now());

        let exhausted = has_exhausted_retries(checkpoint.failure_count, self.config.max_failures);
        if exhausted {
            checkpoint.status = CheckpointStatus::DeadLetter;
        }

        tracing::warn!(
            error = %error,
            failure_count = checkpoint.failure_count,
            target_path = %checkpoint.target_path,
            "Checkpoint repair failed"
        );

        match CheckpointRepo::log(&self.pool, &checkpoint).await {
            Ok(()) if exhausted => {
                summary.dead_lettered += 1;
                self.announce_dead_letter(&checkpoint);
            }
            Ok(()) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to record repair failure in journal");
            }
        }
    }

    fn announce_dead_letter(&self, checkpoint: &Checkpoint) {
        tracing::error!(
            failure_count = checkpoint.failure_count,
            target_path = %checkpoint.target_path,
            "Checkpoint quarantined as dead-letter after repeated failures"
        );
        self.event_bus.publish(PlatformEvent::checkpoint_dead_lettered(
            checkpoint.id.clone(),
            checkpoint.operation_type.as_str(),
            &checkpoint.target_path,
            checkpoint.failure_count,
        ));
    }

    /// Warn about pending checkpoints dated after this pass started.
    ///
    /// After the clock moves backwards such rows are skipped by both the
    /// sweep and the fetch until the wall clock catches up.
    async fn warn_future_dated(&self, started_at: DateTime<Utc>) {
        let after = started_at + chrono::Duration::minutes(FUTURE_DATED_TOLERANCE_MINUTES);
        match CheckpointRepo::count_pending_after(&self.pool, after).await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(
                count,
                "Pending checkpoints are dated in the future and were skipped; \
                 the system clock may have moved backwards"
            ),
            Err(e) => tracing::debug!(error = %e, "Could not check for future-dated checkpoints"),
        }
    }

    /// Append the pass to the run history. Best-effort.
    async fn record_run(&self, started_at: DateTime<Utc>, summary: &RecoverySummary) {
        if let Err(e) = RecoveryRunRepo::insert(&self.pool, started_at, summary).await {
            tracing::warn!(error = %e, "Failed to record recovery run history");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
