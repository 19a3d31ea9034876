// Audit log port - structured security events handed to a sink.
//
// The engine, the query layer, and the event adapter all emit entries;
// where they land (tracing, a channel, an external service) is the sink's
// business. Emitting is infallible from the caller's side: a sink that
// cannot deliver logs the failure itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// An automod rule matched and enforcement ran.
    RuleMatch,
    /// A key hit a window limit.
    RateLimit,
    /// A key was escalated into, or managed on, the blacklist.
    Blacklist,
    /// The query layer rejected suspicious SQL.
    SuspiciousInput,
    /// An actor was denied a capability.
    PermissionDenied,
    /// A sensitive administrative mutation.
    Admin,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::RuleMatch => "rule_match",
            AuditCategory::RateLimit => "rate_limit",
            AuditCategory::Blacklist => "blacklist",
            AuditCategory::SuspiciousInput => "suspicious_input",
            AuditCategory::PermissionDenied => "permission_denied",
            AuditCategory::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: u64,
    pub guild_id: u64,
    /// Short machine-readable action label, e.g. `automod_caps`.
    pub action: String,
    pub category: AuditCategory,
    /// Free-form structured context. Never includes message bodies beyond
    /// what enforcement already exposed.
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: u64,
        guild_id: u64,
        action: impl Into<String>,
        category: AuditCategory,
        details: serde_json::Value,
    ) -> Self {
        Self {
            actor_id,
            guild_id,
            action: action.into(),
            category,
            details,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, entry: AuditEntry);
}
