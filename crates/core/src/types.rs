use chrono::{DateTime, Utc};

/// Checkpoint ids are hyphenated UUID strings, assigned once and never reused.
pub type CheckpointId = String;

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// Generate a fresh, time-ordered checkpoint id.
pub fn new_checkpoint_id() -> CheckpointId {
    uuid::Uuid::now_v7().to_string()
}

/// Convert a timestamp to the Unix-millisecond form stored in SQLite.
pub fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Convert stored Unix milliseconds back into a timestamp.
///
/// Out-of-range values collapse to the Unix epoch rather than failing the
/// whole row; such a record will simply look very old to the stale sweep.
pub fn from_millis(ms: i64) -> Timestamp {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_conversion_is_lossless_at_millisecond_precision() {
        let ts = from_millis(1_760_000_000_123);
        assert_eq!(to_millis(ts), 1_760_000_000_123);
    }

    #[test]
    fn out_of_range_millis_fall_back_to_epoch() {
        assert_eq!(from_millis(i64::MAX), DateTime::<Utc>::default());
    }

    #[test]
    fn checkpoint_ids_are_unique_uuids() {
        let a = new_checkpoint_id();
        let b = new_checkpoint_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
