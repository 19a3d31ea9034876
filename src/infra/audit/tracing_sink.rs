// Audit sink that writes structured tracing events.
//
// The wider deployment forwards audit entries to its own log pipeline;
// from this subsystem's side the contract is just "hand the entry over".

use crate::core::audit::{AuditEntry, AuditSink};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, entry: AuditEntry) {
        tracing::info!(
            target: "modguard::audit",
            actor_id = entry.actor_id,
            guild_id = entry.guild_id,
            action = %entry.action,
            category = %entry.category,
            details = %entry.details,
            "audit entry"
        );
    }
}
