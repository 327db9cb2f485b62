//! Checkpoint constants, operation types and payload encoding.
//!
//! A checkpoint describes an in-flight, non-atomic operation. Its payload is
//! opaque to the journal and the coordinator; only the handler for the
//! matching [`OperationType`] decodes it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Repair failures after which a checkpoint is quarantined as dead-letter.
pub const MAX_FAILURE_COUNT: i32 = 3;

/// Pending checkpoints older than this are swept without repair.
pub const DEFAULT_STALE_MAX_AGE_HOURS: i64 = 24;

/// Version written alongside every payload produced by this build.
pub const CURRENT_PAYLOAD_VERSION: i64 = 1;

/// Suffix appended to a file name to form its write-ahead staging path.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Stored name of [`OperationType::Download`].
pub const OP_DOWNLOAD: &str = "download";
/// Stored name of [`OperationType::TagWrite`].
pub const OP_TAG_WRITE: &str = "tag_write";
/// Stored name of [`OperationType::MetadataHydration`].
pub const OP_METADATA_HYDRATION: &str = "metadata_hydration";

/// Whether a checkpoint with `failure_count` failures must no longer be retried.
pub fn has_exhausted_retries(failure_count: i32, max_failures: i32) -> bool {
    failure_count >= max_failures
}

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// Kind of operation a checkpoint guards.
///
/// Unrecognised stored names are preserved in [`OperationType::Unknown`]
/// so the coordinator can log and discard them instead of failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationType {
    Download,
    TagWrite,
    MetadataHydration,
    Unknown(String),
}

impl OperationType {
    /// String representation for database storage.
    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Download => OP_DOWNLOAD,
            OperationType::TagWrite => OP_TAG_WRITE,
            OperationType::MetadataHydration => OP_METADATA_HYDRATION,
            OperationType::Unknown(name) => name,
        }
    }

    /// Parse a stored name. Never fails.
    pub fn parse(s: &str) -> Self {
        match s {
            OP_DOWNLOAD => OperationType::Download,
            OP_TAG_WRITE => OperationType::TagWrite,
            OP_METADATA_HYDRATION => OperationType::MetadataHydration,
            other => OperationType::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CheckpointStatus
// ---------------------------------------------------------------------------

/// Persisted checkpoint status. Completed checkpoints are deleted, so
/// "completed" has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStatus {
    Pending,
    DeadLetter,
}

impl CheckpointStatus {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::DeadLetter => "dead_letter",
        }
    }

    /// Parse from a string, defaulting to `DeadLetter` for unknown values
    /// so that an unreadable status is never retried automatically.
    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => CheckpointStatus::Pending,
            _ => CheckpointStatus::DeadLetter,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A payload type bound to exactly one operation type.
pub trait CheckpointPayload: Serialize + DeserializeOwned {
    /// Operation this payload describes.
    const OPERATION: OperationType;
}

/// Atomic "replace file contents" implemented as write-to-temp-then-rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagWriteState {
    /// Final destination of the rewritten file.
    pub file_path: PathBuf,
    /// Write-ahead staging file renamed over `file_path` on success.
    pub temp_path: PathBuf,
    /// Creation time of the original file, where the platform reports one.
    pub original_creation_time: Option<Timestamp>,
    /// Modification time of the original file.
    pub original_modified_time: Timestamp,
}

impl TagWriteState {
    /// Build the state for rewriting `file_path` through its default temp path.
    pub fn new(
        file_path: impl Into<PathBuf>,
        original_creation_time: Option<Timestamp>,
        original_modified_time: Timestamp,
    ) -> Self {
        let file_path = file_path.into();
        let temp_path = temp_path_for(&file_path);
        Self {
            file_path,
            temp_path,
            original_creation_time,
            original_modified_time,
        }
    }

    /// Reject states that could not have come from a temp-then-rename write.
    ///
    /// A temp path equal to the target would make the target look like its
    /// own orphaned temp file.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.file_path.as_os_str().is_empty() || self.temp_path.as_os_str().is_empty() {
            return Err(CoreError::Validation(
                "tag write paths must not be empty".to_string(),
            ));
        }
        if self.temp_path == self.file_path {
            return Err(CoreError::Validation(format!(
                "temp path '{}' is the target file itself",
                self.temp_path.display()
            )));
        }
        Ok(())
    }
}

impl CheckpointPayload for TagWriteState {
    const OPERATION: OperationType = OperationType::TagWrite;
}

/// A unit of metadata enrichment work. Recovery re-queues it; it is never
/// re-executed in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrationState {
    pub track_id: String,
    /// Enrichment step that was running. Diagnostic only.
    pub step: String,
}

impl HydrationState {
    /// Parse the track id, which must be a well-formed UUID.
    pub fn parsed_track_id(&self) -> Result<uuid::Uuid, CoreError> {
        validate_track_id(&self.track_id)
    }
}

impl CheckpointPayload for HydrationState {
    const OPERATION: OperationType = OperationType::MetadataHydration;
}

/// Progress of a network download into a partial file.
///
/// Written and consumed by the download engine; the recovery coordinator
/// never decodes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadState {
    pub source: String,
    pub destination: PathBuf,
    pub part_path: PathBuf,
    pub bytes_received: u64,
    pub expected_bytes: Option<u64>,
}

impl CheckpointPayload for DownloadState {
    const OPERATION: OperationType = OperationType::Download;
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a payload for storage at [`CURRENT_PAYLOAD_VERSION`].
pub fn encode_payload<P: CheckpointPayload>(payload: &P) -> Result<String, CoreError> {
    serde_json::to_string(payload).map_err(|e| CoreError::MalformedPayload {
        operation: operation_label::<P>(),
        reason: e.to_string(),
    })
}

/// Decode a stored payload written at `version`.
///
/// Payloads from a newer build are rejected rather than guessed at.
pub fn decode_payload<P: CheckpointPayload>(raw: &str, version: i64) -> Result<P, CoreError> {
    if !(1..=CURRENT_PAYLOAD_VERSION).contains(&version) {
        return Err(CoreError::UnsupportedPayloadVersion {
            found: version,
            supported: CURRENT_PAYLOAD_VERSION,
        });
    }
    serde_json::from_str(raw).map_err(|e| CoreError::MalformedPayload {
        operation: operation_label::<P>(),
        reason: e.to_string(),
    })
}

fn operation_label<P: CheckpointPayload>() -> &'static str {
    match P::OPERATION {
        OperationType::Download => OP_DOWNLOAD,
        OperationType::TagWrite => OP_TAG_WRITE,
        OperationType::MetadataHydration => OP_METADATA_HYDRATION,
        OperationType::Unknown(_) => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Validation and paths
// ---------------------------------------------------------------------------

/// Validate that a track id is a well-formed UUID.
pub fn validate_track_id(track_id: &str) -> Result<uuid::Uuid, CoreError> {
    let trimmed = track_id.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("track_id must not be empty".to_string()));
    }
    uuid::Uuid::parse_str(trimmed)
        .map_err(|_| CoreError::Validation(format!("track_id '{trimmed}' is not a valid UUID")))
}

/// Staging path for an atomic rewrite of `path`: the same name plus [`TEMP_SUFFIX`].
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    #[test]
    fn operation_type_roundtrips_known_names() {
        for op in [
            OperationType::Download,
            OperationType::TagWrite,
            OperationType::MetadataHydration,
        ] {
            assert_eq!(OperationType::parse(op.as_str()), op);
        }
    }

    #[test]
    fn unknown_operation_type_is_preserved() {
        let op = OperationType::parse("playlist_sync");
        assert_eq!(op, OperationType::Unknown("playlist_sync".to_string()));
        assert_eq!(op.to_string(), "playlist_sync");
    }

    #[test]
    fn unknown_status_is_never_pending() {
        assert_eq!(CheckpointStatus::from_str("pending"), CheckpointStatus::Pending);
        assert_eq!(CheckpointStatus::from_str("dead_letter"), CheckpointStatus::DeadLetter);
        assert_eq!(CheckpointStatus::from_str("garbage"), CheckpointStatus::DeadLetter);
    }

    #[test]
    fn retries_exhausted_at_threshold() {
        assert!(!has_exhausted_retries(2, MAX_FAILURE_COUNT));
        assert!(has_exhausted_retries(3, MAX_FAILURE_COUNT));
        assert!(has_exhausted_retries(7, MAX_FAILURE_COUNT));
    }

    #[test]
    fn temp_path_appends_suffix_to_full_name() {
        assert_eq!(
            temp_path_for(Path::new("/music/a.flac")),
            PathBuf::from("/music/a.flac.tmp")
        );
    }

    #[test]
    fn tag_write_state_uses_default_temp_path() {
        let modified = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let state = TagWriteState::new("/a.flac", None, modified);
        assert_eq!(state.temp_path, PathBuf::from("/a.flac.tmp"));

        let raw = encode_payload(&state).unwrap();
        let decoded: TagWriteState = decode_payload(&raw, CURRENT_PAYLOAD_VERSION).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn tag_write_state_with_temp_equal_to_target_is_invalid() {
        let mut state = TagWriteState::new("/music/a.flac", None, Utc::now());
        assert!(state.validate().is_ok());

        state.temp_path = PathBuf::from("/music/./a.flac");
        assert_matches!(state.validate(), Err(CoreError::Validation(_)));

        state.temp_path = PathBuf::new();
        assert_matches!(state.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn newer_payload_version_is_rejected() {
        let err = decode_payload::<HydrationState>("{}", CURRENT_PAYLOAD_VERSION + 1).unwrap_err();
        assert_matches!(err, CoreError::UnsupportedPayloadVersion { found: 2, .. });
    }

    #[test]
    fn payload_of_wrong_shape_is_malformed() {
        let err = decode_payload::<TagWriteState>(r#"{"track_id":"x"}"#, 1).unwrap_err();
        assert_matches!(
            err,
            CoreError::MalformedPayload {
                operation: OP_TAG_WRITE,
                ..
            }
        );
    }

    #[test]
    fn track_id_must_be_uuid() {
        let ok = HydrationState {
            track_id: "6f1c1e0a-3b8e-4d36-9a8e-0f6d2c0d5b11".to_string(),
            step: "credits".to_string(),
        };
        assert!(ok.parsed_track_id().is_ok());

        assert_matches!(validate_track_id(""), Err(CoreError::Validation(_)));
        assert_matches!(validate_track_id("track-42"), Err(CoreError::Validation(_)));
    }
}
