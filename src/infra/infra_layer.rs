// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "audit/tracing_sink.rs"]
pub mod audit;

#[path = "automod/sqlite_rule_store.rs"]
pub mod automod;

#[path = "db/mod.rs"]
pub mod db;

#[path = "violations/sqlite_violation_store.rs"]
pub mod violations;
