//! Startup crash recovery for Lyra.
//!
//! On process start the [`RecoveryCoordinator`] reads the checkpoint
//! journal, repairs what interrupted operations left behind and reports a
//! [`RecoverySummary`](lyra_core::recovery::RecoverySummary). Subsystems
//! that write checkpoints during normal operation use the [`hooks`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod hooks;

pub use config::RecoveryConfig;
pub use coordinator::{RecoveryCoordinator, RecoveryOutcome};
pub use error::RecoveryError;
