//! Journaled write-to-temp-then-rename of a file's contents.
//!
//! The checkpoint is logged before the temp file is created and completed
//! only after the rename, so a crash at any point leaves a journal entry the
//! [`TagWriteHandler`](crate::handlers::TagWriteHandler) can reconcile.

use std::path::Path;

use chrono::{DateTime, Utc};
use lyra_core::checkpointing::TagWriteState;
use lyra_db::models::checkpoint::Checkpoint;
use lyra_db::repositories::CheckpointRepo;
use lyra_db::DbPool;
use tokio::io::AsyncWriteExt;

use crate::error::RecoveryError;
use crate::handlers::tag_write::restore_timestamps;

/// Replaces file contents atomically under a checkpoint.
#[derive(Debug, Clone)]
pub struct AtomicTagWriter {
    pool: DbPool,
}

impl AtomicTagWriter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replace the contents of `path` with `contents`.
    ///
    /// The original modification time (and creation time, where available)
    /// is carried over to the new file. On error the checkpoint is left
    /// pending for the next recovery pass.
    pub async fn replace_contents(
        &self,
        path: &Path,
        contents: &[u8],
        priority: i32,
    ) -> Result<(), RecoveryError> {
        let state = capture_state(path).await?;
        let checkpoint = Checkpoint::new(path.display().to_string(), &state, priority)?;
        CheckpointRepo::log(&self.pool, &checkpoint).await?;

        write_synced(&state.temp_path, contents).await?;

        tokio::fs::rename(&state.temp_path, &state.file_path)
            .await
            .map_err(|e| RecoveryError::io(&state.temp_path, e))?;

        if let Err(e) = restore_timestamps(&state.file_path, &state).await {
            tracing::warn!(
                path = %state.file_path.display(),
                error = %e,
                "Could not restore original timestamps"
            );
        }

        CheckpointRepo::complete(&self.pool, &checkpoint.id).await?;
        tracing::debug!(path = %path.display(), checkpoint_id = %checkpoint.id, "File contents replaced");
        Ok(())
    }
}

/// Record the target's current timestamps. A missing target is a fresh file.
async fn capture_state(path: &Path) -> Result<TagWriteState, RecoveryError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let created = meta.created().ok().map(DateTime::<Utc>::from);
            Ok(TagWriteState::new(path, created, modified))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(TagWriteState::new(path, None, Utc::now()))
        }
        Err(e) => Err(RecoveryError::io(path, e)),
    }
}

async fn write_synced(path: &Path, contents: &[u8]) -> Result<(), RecoveryError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| RecoveryError::io(path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| RecoveryError::io(path, e))?;
    file.sync_all().await.map_err(|e| RecoveryError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use assert_matches::assert_matches;
    use lyra_core::checkpointing::{temp_path_for, OperationType};

    use super::*;

    #[sqlx::test(migrations = "../db/migrations")]
    async fn replaces_contents_and_clears_checkpoint(pool: DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.flac");
        std::fs::write(&path, b"old").unwrap();

        let original = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(original)
            .unwrap();

        AtomicTagWriter::new(pool.clone())
            .replace_contents(&path, b"new tags", 0)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new tags");
        assert!(!temp_path_for(&path).exists());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), original);

        let pending = CheckpointRepo::list_pending_by_type(&pool, &OperationType::TagWrite)
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[sqlx::test(migrations = "../db/migrations")]
    async fn creates_missing_target(pool: DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.flac");

        AtomicTagWriter::new(pool)
            .replace_contents(&path, b"first", 0)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"first");
    }

    #[sqlx::test(migrations = "../db/migrations")]
    async fn failed_write_leaves_checkpoint_pending(pool: DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("song.flac");

        let err = AtomicTagWriter::new(pool.clone())
            .replace_contents(&path, b"new", 0)
            .await
            .unwrap_err();
        assert_matches!(err, RecoveryError::Io { .. });

        let pending = CheckpointRepo::list_pending_by_type(&pool, &OperationType::TagWrite)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        let state: TagWriteState = pending[0].payload().unwrap();
        assert_eq!(state.file_path, path);
    }
}
