//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&DbPool` as the first argument.

pub mod checkpoint_repo;
pub mod enrichment_task_repo;
pub mod recovery_run_repo;

pub use checkpoint_repo::CheckpointRepo;
pub use enrichment_task_repo::EnrichmentTaskRepo;
pub use recovery_run_repo::RecoveryRunRepo;
