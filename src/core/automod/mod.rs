// Core automod module - rules, detectors, and the evaluation engine.
// Following the same pattern as the ratelimit module.

pub mod automod_models;
pub mod automod_service;
pub mod detectors;

pub use automod_models::*;
pub use automod_service::*;
