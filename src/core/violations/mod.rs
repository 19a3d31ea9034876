// Core violation tracking module.
// Following the same pattern as the automod module.

pub mod violation_models;
pub mod violation_service;

pub use violation_models::*;
pub use violation_service::*;
