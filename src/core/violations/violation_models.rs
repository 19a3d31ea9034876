// Violation tracking domain models.

use crate::core::automod::RuleType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running counter of confirmed rule matches, one per
/// (user, guild, violation type). Created on the first violation and
/// incremented thereafter; never aged out by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub user_id: u64,
    pub guild_id: u64,
    pub violation_type: RuleType,
    pub count: u32,
    pub last_violation_at: DateTime<Utc>,
}
