// Discord layer - event adapters and enforcement.

#[path = "enforcement.rs"]
pub mod enforcement;

#[path = "event_adapter.rs"]
pub mod event_adapter;

// Re-export handler types for convenience
pub use event_adapter::{Data, Engine, Error};
