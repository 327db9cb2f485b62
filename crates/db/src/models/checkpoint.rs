//! Checkpoint journal entity and health summary.

use lyra_core::checkpointing::{
    decode_payload, encode_payload, CheckpointPayload, CheckpointStatus, OperationType,
    CURRENT_PAYLOAD_VERSION,
};
use lyra_core::error::CoreError;
use lyra_core::types::{from_millis, new_checkpoint_id, CheckpointId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A durable record of one in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub operation_type: OperationType,
    /// Human-readable pointer to the affected resource. Diagnostic only.
    pub target_path: String,
    /// Serialized, operation-specific payload.
    pub state_payload: String,
    pub payload_version: i64,
    pub status: CheckpointStatus,
    pub failure_count: i32,
    /// Lower values are processed first.
    pub priority: i32,
    pub created_at: Timestamp,
    pub last_attempt_at: Option<Timestamp>,
}

impl Checkpoint {
    /// Build a fresh pending checkpoint for `payload`.
    pub fn new<P: CheckpointPayload>(
        target_path: impl Into<String>,
        payload: &P,
        priority: i32,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id: new_checkpoint_id(),
            operation_type: P::OPERATION,
            target_path: target_path.into(),
            state_payload: encode_payload(payload)?,
            payload_version: CURRENT_PAYLOAD_VERSION,
            status: CheckpointStatus::Pending,
            failure_count: 0,
            priority,
            created_at: chrono::Utc::now(),
            last_attempt_at: None,
        })
    }

    /// Decode the payload as `P`.
    ///
    /// Fails if `P` belongs to a different operation type than this record.
    pub fn payload<P: CheckpointPayload>(&self) -> Result<P, CoreError> {
        if self.operation_type != P::OPERATION {
            return Err(CoreError::Validation(format!(
                "checkpoint {} is a {} operation, not {}",
                self.id,
                self.operation_type,
                P::OPERATION
            )));
        }
        decode_payload(&self.state_payload, self.payload_version)
    }

    /// Replace the payload, re-encoding at the current version.
    pub fn set_payload<P: CheckpointPayload>(&mut self, payload: &P) -> Result<(), CoreError> {
        self.state_payload = encode_payload(payload)?;
        self.payload_version = CURRENT_PAYLOAD_VERSION;
        Ok(())
    }
}

/// Raw `checkpoints` row as stored.
#[derive(Debug, FromRow)]
pub(crate) struct CheckpointRow {
    pub id: String,
    pub operation_type: String,
    pub target_path: String,
    pub state_payload: String,
    pub payload_version: i64,
    pub status: String,
    pub failure_count: i32,
    pub priority: i32,
    pub created_at_ms: i64,
    pub last_attempt_at_ms: Option<i64>,
}

impl From<CheckpointRow> for Checkpoint {
    fn from(row: CheckpointRow) -> Self {
        Self {
            id: row.id,
            operation_type: OperationType::parse(&row.operation_type),
            target_path: row.target_path,
            state_payload: row.state_payload,
            payload_version: row.payload_version,
            status: CheckpointStatus::from_str(&row.status),
            failure_count: row.failure_count,
            priority: row.priority,
            created_at: from_millis(row.created_at_ms),
            last_attempt_at: row.last_attempt_at_ms.map(from_millis),
        }
    }
}

/// Journal counts for observability collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    /// Checkpoints reconciled by recovery passes, across all recorded runs.
    pub recovered: i64,
    pub dead_letter: i64,
    pub pending: i64,
    /// Start of the most recent recorded recovery pass.
    pub last_run_at: Option<Timestamp>,
}
