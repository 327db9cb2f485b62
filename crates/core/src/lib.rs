//! Domain types for the Lyra crash-recovery subsystem.
//!
//! This crate has no I/O dependencies so it can be shared by the journal
//! (`lyra-db`), the recovery coordinator and any subsystem that writes
//! checkpoints before performing a multi-step side effect.

pub mod checkpointing;
pub mod error;
pub mod recovery;
pub mod types;
