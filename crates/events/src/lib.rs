//! Lyra in-process event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the canonical event envelope.
//! - [`event_types`]: well-known event names.

pub mod bus;
pub mod event_types;

pub use bus::{EventBus, PlatformEvent};
