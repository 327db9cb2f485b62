//! Well-known event type names.

/// A startup recovery pass finished with something worth reporting.
pub const RECOVERY_COMPLETED: &str = "recovery.completed";

/// A checkpoint was quarantined after repeated repair failures.
pub const CHECKPOINT_DEAD_LETTERED: &str = "checkpoint.dead_lettered";
