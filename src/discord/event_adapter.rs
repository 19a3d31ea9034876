// Discord event adapter - turns gateway messages into moderation events.
//
// The pipeline is: cheap synchronous rate limit gate first, then the
// automod engine. Everything Discord-specific (mention counting, role and
// permission lookup) happens here so the core stays platform-agnostic.

use super::enforcement::SerenityGateway;
use crate::core::audit::{AuditCategory, AuditEntry, AuditSink};
use crate::core::automod::{AutoModEngine, EvaluationOutcome, ModerationEvent};
use crate::core::ratelimit::RateLimiter;
use crate::core::violations::ViolationTracker;
use crate::infra::audit::TracingAuditSink;
use crate::infra::automod::SqliteRuleStore;
use crate::infra::violations::SqliteViolationStore;
use serenity::all::{Context, Message};
use serde_json::json;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// The concrete engine this deployment runs.
pub type Engine =
    AutoModEngine<SqliteRuleStore, SqliteViolationStore, SerenityGateway, TracingAuditSink>;

/// Shared services handed to the event handler.
pub struct Data {
    pub rate_limiter: Arc<RateLimiter>,
    pub engine: Arc<Engine>,
    /// Kept for admin command surfaces; the message pipeline records
    /// violations through the engine.
    #[allow(dead_code)]
    pub violations: Arc<ViolationTracker<SqliteViolationStore>>,
    pub audit: Arc<TracingAuditSink>,
}

/// Run one inbound message through the security pipeline.
///
/// Returns `true` when the message was handled (rate limited or matched a
/// rule) and needs no further processing.
pub async fn handle_message(ctx: &Context, msg: &Message, data: &Data) -> Result<bool, Error> {
    // Skip bots
    if msg.author.bot {
        return Ok(false);
    }

    // Only check guild messages
    let guild_id = match msg.guild_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let user_id = msg.author.id.get();

    let key = format!("msg:{}:{}", guild_id.get(), user_id);
    let decision = data.rate_limiter.check(&key, "default");
    if decision.escalated {
        data.audit
            .emit(AuditEntry::new(
                user_id,
                guild_id.get(),
                "rate_limit_escalation",
                AuditCategory::Blacklist,
                json!({ "key": key }),
            ))
            .await;
    }
    if decision.limited {
        tracing::debug!(
            user_id,
            guild_id = guild_id.get(),
            "message dropped by rate limiter"
        );
        return Ok(true);
    }

    // Count mentions (users + roles)
    let mention_count = (msg.mentions.len() + msg.mention_roles.len()) as u32;

    // Capability lookup has to finish before any await: the cache guard is
    // not Send.
    let (author_is_owner, author_is_admin, author_role_ids) = {
        let fallback_roles = || {
            msg.member
                .as_ref()
                .map(|m| m.roles.iter().map(|r| r.get()).collect::<Vec<u64>>())
                .unwrap_or_default()
        };

        match ctx.cache.guild(guild_id) {
            Some(guild) => {
                let is_owner = guild.owner_id == msg.author.id;
                let member = guild.members.get(&msg.author.id);
                let is_admin = member
                    .map(|m| {
                        let perms = guild.member_permissions(m);
                        perms.administrator() || perms.manage_messages()
                    })
                    .unwrap_or(false);
                let roles = member
                    .map(|m| m.roles.iter().map(|r| r.get()).collect::<Vec<u64>>())
                    .unwrap_or_else(fallback_roles);
                (is_owner, is_admin, roles)
            }
            None => (false, false, fallback_roles()),
        }
    };

    let event = ModerationEvent {
        author_id: user_id,
        guild_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        message_id: msg.id.get(),
        content: msg.content.clone(),
        mention_count,
        author_role_ids,
        author_is_owner,
        author_is_admin,
        timestamp: chrono::Utc::now(),
    };

    match data.engine.evaluate(&event).await {
        Ok(EvaluationOutcome::Matched {
            rule_id,
            rule_type,
            action,
        }) => {
            tracing::info!(rule_id, %rule_type, %action, "message handled by automod");
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) => Err(Error::from(e.to_string())),
    }
}
