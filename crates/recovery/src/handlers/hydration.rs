//! Repair of interrupted metadata enrichment.
//!
//! Enrichment is never re-run in place. A well-formed track id is
//! re-submitted to the persistent task queue; a malformed one cannot be
//! acted on and is discarded.

use std::future::Future;

use lyra_core::checkpointing::HydrationState;
use lyra_core::recovery::RepairOutcome;
use lyra_db::repositories::EnrichmentTaskRepo;
use lyra_db::DbPool;

use crate::error::RecoveryError;

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

/// Destination for re-submitted enrichment work.
pub trait TaskQueue: Send + Sync {
    /// Queue enrichment of `track_id`, correlated with `context_id`.
    ///
    /// Must be idempotent per `(track_id, context_id)`. Returns `true` if
    /// new work was queued.
    fn enqueue_enrichment(
        &self,
        track_id: &str,
        context_id: &str,
    ) -> impl Future<Output = Result<bool, RecoveryError>> + Send;
}

/// [`TaskQueue`] backed by the `enrichment_tasks` table.
#[derive(Debug, Clone)]
pub struct SqliteTaskQueue {
    pool: DbPool,
}

impl SqliteTaskQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl TaskQueue for SqliteTaskQueue {
    async fn enqueue_enrichment(
        &self,
        track_id: &str,
        context_id: &str,
    ) -> Result<bool, RecoveryError> {
        EnrichmentTaskRepo::enqueue(&self.pool, track_id, context_id)
            .await
            .map_err(RecoveryError::Queue)
    }
}

// ---------------------------------------------------------------------------
// HydrationHandler
// ---------------------------------------------------------------------------

/// Repairs [`HydrationState`] checkpoints by re-queueing their work.
#[derive(Debug, Clone)]
pub struct HydrationHandler<Q> {
    queue: Q,
}

impl<Q: TaskQueue> HydrationHandler<Q> {
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }

    /// Re-submit the enrichment described by `state`.
    ///
    /// `checkpoint_id` is passed as the queue context id, so a pass that
    /// crashes between enqueueing and completing the checkpoint does not
    /// queue the same work twice.
    pub async fn repair(
        &self,
        checkpoint_id: &str,
        state: &HydrationState,
    ) -> Result<RepairOutcome, RecoveryError> {
        let track_id = match state.parsed_track_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    track_id = %state.track_id,
                    step = %state.step,
                    error = %e,
                    "Discarding hydration checkpoint with malformed track id"
                );
                return Ok(RepairOutcome::Cleaned);
            }
        };

        let queued = self
            .queue
            .enqueue_enrichment(&track_id.to_string(), checkpoint_id)
            .await?;

        tracing::info!(
            %track_id,
            step = %state.step,
            newly_queued = queued,
            "Re-queued interrupted enrichment"
        );
        Ok(RepairOutcome::Resumed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    /// Records submissions in memory.
    #[derive(Default)]
    struct RecordingQueue {
        submitted: Mutex<Vec<(String, String)>>,
    }

    impl TaskQueue for RecordingQueue {
        async fn enqueue_enrichment(
            &self,
            track_id: &str,
            context_id: &str,
        ) -> Result<bool, RecoveryError> {
            self.submitted
                .lock()
                .unwrap()
                .push((track_id.to_string(), context_id.to_string()));
            Ok(true)
        }
    }

    struct FailingQueue;

    impl TaskQueue for FailingQueue {
        async fn enqueue_enrichment(&self, _: &str, _: &str) -> Result<bool, RecoveryError> {
            Err(RecoveryError::Queue(sqlx::Error::PoolClosed))
        }
    }

    fn state(track_id: &str) -> HydrationState {
        HydrationState {
            track_id: track_id.to_string(),
            step: "credits".to_string(),
        }
    }

    #[tokio::test]
    async fn valid_track_is_requeued_with_checkpoint_context() {
        let handler = HydrationHandler::new(RecordingQueue::default());
        let track = "3c9a6f2e-4b1d-4e8f-a0c7-9d2b5e1f3a64";

        let outcome = handler.repair("cp-1", &state(track)).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Resumed);
        let submitted = handler.queue.submitted.lock().unwrap();
        assert_eq!(submitted.as_slice(), &[(track.to_string(), "cp-1".to_string())]);
    }

    #[tokio::test]
    async fn malformed_track_is_cleaned_without_submission() {
        let handler = HydrationHandler::new(RecordingQueue::default());

        let outcome = handler.repair("cp-2", &state("not-a-track")).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Cleaned);
        assert!(handler.queue.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn queue_failure_propagates() {
        let handler = HydrationHandler::new(FailingQueue);

        let err = handler
            .repair("cp-3", &state("3c9a6f2e-4b1d-4e8f-a0c7-9d2b5e1f3a64"))
            .await
            .unwrap_err();

        assert_matches!(err, RecoveryError::Queue(_));
    }
}
