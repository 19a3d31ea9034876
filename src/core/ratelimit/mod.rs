// Core rate limiting module - fixed-window counters and blacklist.
// Following the same pattern as the automod module.

pub mod rate_limit_models;
pub mod rate_limit_service;

pub use rate_limit_models::*;
pub use rate_limit_service::*;
