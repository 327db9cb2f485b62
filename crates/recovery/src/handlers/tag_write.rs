//! Repair of interrupted write-to-temp-then-rename file rewrites.
//!
//! | temp | target | action                          | outcome    |
//! |------|--------|---------------------------------|------------|
//! | no   | yes    | none                            | `Verified` |
//! | yes  | no     | rename temp over target         | `Resumed`  |
//! | yes  | yes    | delete orphaned temp            | `Cleaned`  |
//! | no   | no     | none                            | `Verified` |

use std::fs::FileTimes;
use std::path::Path;
use std::time::SystemTime;

use lyra_core::checkpointing::TagWriteState;
use lyra_core::recovery::RepairOutcome;

use crate::error::RecoveryError;

/// Repairs [`TagWriteState`] checkpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagWriteHandler;

impl TagWriteHandler {
    pub fn new() -> Self {
        Self
    }

    /// Reconcile the temp/target pair described by `state`.
    ///
    /// An inconsistent state is rejected before any file is touched. Rename
    /// and delete failures are returned as errors. Failing to restore the
    /// original timestamps is only logged.
    pub async fn repair(&self, state: &TagWriteState) -> Result<RepairOutcome, RecoveryError> {
        state.validate()?;

        let temp_exists = exists(&state.temp_path).await?;
        let target_exists = exists(&state.file_path).await?;

        match (temp_exists, target_exists) {
            (false, true) => {
                tracing::debug!(path = %state.file_path.display(), "Rewrite already completed");
                Ok(RepairOutcome::Verified)
            }
            (true, false) => {
                tokio::fs::rename(&state.temp_path, &state.file_path)
                    .await
                    .map_err(|e| RecoveryError::io(&state.temp_path, e))?;

                if let Err(e) = restore_timestamps(&state.file_path, state).await {
                    tracing::warn!(
                        path = %state.file_path.display(),
                        error = %e,
                        "Could not restore original timestamps"
                    );
                }

                tracing::info!(
                    path = %state.file_path.display(),
                    "Completed interrupted rewrite from staged temp file"
                );
                Ok(RepairOutcome::Resumed)
            }
            (true, true) => {
                tokio::fs::remove_file(&state.temp_path)
                    .await
                    .map_err(|e| RecoveryError::io(&state.temp_path, e))?;

                tracing::info!(
                    temp_path = %state.temp_path.display(),
                    "Removed orphaned temp file"
                );
                Ok(RepairOutcome::Cleaned)
            }
            (false, false) => {
                tracing::debug!(
                    path = %state.file_path.display(),
                    "Neither temp nor target exists, nothing to repair"
                );
                Ok(RepairOutcome::Verified)
            }
        }
    }
}

async fn exists(path: &Path) -> Result<bool, RecoveryError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| RecoveryError::io(path, e))
}

/// Set `path`'s modification (and, on Windows, creation) time back to the
/// values recorded in `state`.
pub(crate) async fn restore_timestamps(path: &Path, state: &TagWriteState) -> std::io::Result<()> {
    let path = path.to_path_buf();
    let modified = SystemTime::from(state.original_modified_time);
    let created = state.original_creation_time.map(SystemTime::from);

    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        let times = FileTimes::new().set_modified(modified);

        #[cfg(windows)]
        let times = match created {
            Some(created) => {
                use std::os::windows::fs::FileTimesExt;
                times.set_created(created)
            }
            None => times,
        };

        if cfg!(not(windows)) && created.is_some() {
            tracing::debug!(path = %path.display(), "Creation time is not settable on this platform");
        }

        file.set_times(times)
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use lyra_core::error::CoreError;

    use super::*;

    fn state_in(dir: &Path) -> TagWriteState {
        let modified = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap();
        TagWriteState::new(dir.join("a.flac"), None, modified)
    }

    #[tokio::test]
    async fn only_temp_is_renamed_over_target() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        std::fs::write(&state.temp_path, b"new tags").unwrap();

        let outcome = TagWriteHandler::new().repair(&state).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Resumed);
        assert!(!state.temp_path.exists());
        assert_eq!(std::fs::read(&state.file_path).unwrap(), b"new tags");

        let modified = std::fs::metadata(&state.file_path).unwrap().modified().unwrap();
        assert_eq!(modified, SystemTime::from(state.original_modified_time));
    }

    #[tokio::test]
    async fn orphaned_temp_is_deleted_and_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        std::fs::write(&state.file_path, b"original").unwrap();
        std::fs::write(&state.temp_path, b"half written").unwrap();

        let outcome = TagWriteHandler::new().repair(&state).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Cleaned);
        assert!(!state.temp_path.exists());
        assert_eq!(std::fs::read(&state.file_path).unwrap(), b"original");
    }

    #[tokio::test]
    async fn completed_write_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        std::fs::write(&state.file_path, b"done").unwrap();

        let outcome = TagWriteHandler::new().repair(&state).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Verified);
        assert_eq!(std::fs::read(&state.file_path).unwrap(), b"done");
    }

    #[tokio::test]
    async fn missing_pair_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let outcome = TagWriteHandler::new().repair(&state).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Verified);
        assert!(!state.file_path.exists());
    }

    #[tokio::test]
    async fn rename_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let modified = Utc::now();
        let mut state = TagWriteState::new(dir.path().join("missing-dir").join("a.flac"), None, modified);
        state.temp_path = dir.path().join("a.flac.tmp");
        std::fs::write(&state.temp_path, b"staged").unwrap();

        let err = TagWriteHandler::new().repair(&state).await.unwrap_err();

        assert_matches!(err, RecoveryError::Io { .. });
        assert!(state.temp_path.exists(), "temp must survive a failed rename");
    }

    #[tokio::test]
    async fn temp_path_equal_to_target_is_rejected_and_target_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());
        state.temp_path = state.file_path.clone();
        std::fs::write(&state.file_path, b"user audio").unwrap();

        let err = TagWriteHandler::new().repair(&state).await.unwrap_err();

        assert_matches!(err, RecoveryError::Payload(CoreError::Validation(_)));
        assert_eq!(std::fs::read(&state.file_path).unwrap(), b"user audio");
    }

    #[tokio::test]
    async fn timestamp_restore_failure_still_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        // A directory renames fine but cannot be opened for writing.
        std::fs::create_dir(&state.temp_path).unwrap();

        let outcome = TagWriteHandler::new().repair(&state).await.unwrap();

        assert_eq!(outcome, RepairOutcome::Resumed);
        assert!(state.file_path.is_dir());
        assert!(!state.temp_path.exists());
        assert!(restore_timestamps(&state.file_path, &state).await.is_err());
    }

    #[tokio::test]
    async fn repair_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        std::fs::write(&state.temp_path, b"staged").unwrap();

        let handler = TagWriteHandler::new();
        assert_eq!(handler.repair(&state).await.unwrap(), RepairOutcome::Resumed);
        assert_eq!(handler.repair(&state).await.unwrap(), RepairOutcome::Verified);
        assert_eq!(std::fs::read(&state.file_path).unwrap(), b"staged");
    }
}
