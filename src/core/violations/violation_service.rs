// Violation tracker - persistent per-user counters of rule matches.
//
// Counts are kept for reporting and moderator tooling only; they do not
// feed back into which enforcement action a rule takes.

use super::violation_models::ViolationRecord;
use crate::core::automod::RuleType;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViolationError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Trait for persisting violation counters.
#[async_trait]
pub trait ViolationStore: Send + Sync {
    /// Upsert the (user, guild, type) row: create at count 1 or increment,
    /// stamping `last_violation_at`. Returns the row after the write.
    async fn record(
        &self,
        user_id: u64,
        guild_id: u64,
        violation_type: RuleType,
    ) -> Result<ViolationRecord, ViolationError>;

    /// All records for a guild, optionally narrowed to one user.
    async fn query(
        &self,
        guild_id: u64,
        user_id: Option<u64>,
    ) -> Result<Vec<ViolationRecord>, ViolationError>;

    /// Delete matching rows. Returns how many were removed.
    async fn clear(
        &self,
        guild_id: u64,
        user_id: Option<u64>,
        violation_type: Option<RuleType>,
    ) -> Result<u64, ViolationError>;
}

/// Service wrapper exposed to the automod engine and admin commands.
pub struct ViolationTracker<S: ViolationStore> {
    store: S,
}

impl<S: ViolationStore> ViolationTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        user_id: u64,
        guild_id: u64,
        violation_type: RuleType,
    ) -> Result<ViolationRecord, ViolationError> {
        self.store.record(user_id, guild_id, violation_type).await
    }

    #[allow(dead_code)]
    pub async fn for_guild(&self, guild_id: u64) -> Result<Vec<ViolationRecord>, ViolationError> {
        self.store.query(guild_id, None).await
    }

    #[allow(dead_code)]
    pub async fn for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<ViolationRecord>, ViolationError> {
        self.store.query(guild_id, Some(user_id)).await
    }

    #[allow(dead_code)]
    pub async fn clear(
        &self,
        guild_id: u64,
        user_id: Option<u64>,
        violation_type: Option<RuleType>,
    ) -> Result<u64, ViolationError> {
        self.store.clear(guild_id, user_id, violation_type).await
    }
}
