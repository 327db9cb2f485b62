//! Per-operation repair handlers.
//!
//! A handler inspects what an interrupted operation left behind and makes
//! it consistent. Handlers never touch the journal; they report a
//! [`RepairOutcome`](lyra_core::recovery::RepairOutcome) or an error and the
//! coordinator performs the single authoritative journal write.

pub mod hydration;
pub mod tag_write;

pub use hydration::{HydrationHandler, SqliteTaskQueue, TaskQueue};
pub use tag_write::TagWriteHandler;
