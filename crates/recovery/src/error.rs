use std::path::PathBuf;

use lyra_core::error::CoreError;

/// Errors raised while repairing a checkpoint or running a recovery pass.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// The checkpoint journal could not be read or written.
    #[error("Journal error: {0}")]
    Journal(#[from] sqlx::Error),

    /// A file-system operation on a checkpoint's target failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint payload could not be interpreted.
    #[error(transparent)]
    Payload(#[from] CoreError),

    /// The enrichment task queue rejected a submission.
    #[error("Task queue error: {0}")]
    Queue(#[source] sqlx::Error),
}

impl RecoveryError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_path() {
        let err = RecoveryError::io(
            "/music/a.flac.tmp",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/music/a.flac.tmp"));
        assert!(msg.contains("denied"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn payload_error_is_transparent() {
        let err = RecoveryError::from(CoreError::Validation("bad".to_string()));
        assert_eq!(err.to_string(), "Validation failed: bad");
    }
}
