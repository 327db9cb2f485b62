//! Entity structs and their raw row counterparts.
//!
//! Rows are decoded into `*Row` structs (`FromRow`) holding the stored
//! primitives, then converted into the typed entity the rest of the
//! workspace uses.

pub mod checkpoint;
pub mod enrichment_task;
pub mod recovery_run;
