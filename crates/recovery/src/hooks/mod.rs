//! Checkpoint producers used by subsystems during normal operation.
//!
//! Each hook journals its intent before touching the file system and
//! completes the checkpoint once the operation has fully landed.

pub mod atomic_write;
pub mod download;

pub use atomic_write::AtomicTagWriter;
pub use download::DownloadCheckpointHook;
