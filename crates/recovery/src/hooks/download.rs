//! Journal access for the download engine.
//!
//! Download checkpoints are written here and read back by the download
//! engine's own resume sweep. The startup recovery pass leaves them alone.

use chrono::Utc;
use lyra_core::checkpointing::{DownloadState, OperationType};
use lyra_db::models::checkpoint::Checkpoint;
use lyra_db::repositories::CheckpointRepo;
use lyra_db::DbPool;

use crate::error::RecoveryError;

/// Journals download progress.
#[derive(Debug, Clone)]
pub struct DownloadCheckpointHook {
    pool: DbPool,
}

impl DownloadCheckpointHook {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Journal the start of a download.
    pub async fn begin(&self, state: &DownloadState, priority: i32) -> Result<Checkpoint, RecoveryError> {
        let checkpoint = Checkpoint::new(state.destination.display().to_string(), state, priority)?;
        CheckpointRepo::log(&self.pool, &checkpoint).await?;
        tracing::debug!(
            checkpoint_id = %checkpoint.id,
            source = %state.source,
            "Download checkpoint logged"
        );
        Ok(checkpoint)
    }

    /// Persist the byte count received so far.
    pub async fn record_progress(
        &self,
        checkpoint: &mut Checkpoint,
        bytes_received: u64,
    ) -> Result<(), RecoveryError> {
        let mut state: DownloadState = checkpoint.payload()?;
        state.bytes_received = bytes_received;
        checkpoint.set_payload(&state)?;
        checkpoint.last_attempt_at = Some(Utc::now());
        CheckpointRepo::log(&self.pool, checkpoint).await?;
        Ok(())
    }

    /// Remove the checkpoint of a finished download. Idempotent.
    pub async fn finish(&self, checkpoint_id: &str) -> Result<bool, RecoveryError> {
        Ok(CheckpointRepo::complete(&self.pool, checkpoint_id).await?)
    }

    /// Pending downloads, in processing order, for the resume sweep.
    pub async fn pending(&self) -> Result<Vec<Checkpoint>, RecoveryError> {
        Ok(CheckpointRepo::list_pending_by_type(&self.pool, &OperationType::Download).await?)
    }
}
