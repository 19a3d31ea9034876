// Automod engine - evaluates a guild's rules against inbound messages.
//
// Pipeline per event: bypass check, exemption checks per rule, detector
// dispatch, then enforcement for the first matching rule only. Platform
// failures during enforcement are logged and swallowed; they never stop
// the violation record or the audit entry, and never poison later events.
//
// NO Discord dependencies here - the gateway is a port.

use super::automod_models::{
    AutoModRule, EvaluationOutcome, HistoryEntry, ModerationEvent, RuleAction, RuleDraft,
    RuleValidationError,
};
use super::detectors;
use crate::core::audit::{AuditCategory, AuditEntry, AuditSink};
use crate::core::violations::{ViolationStore, ViolationTracker};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Timeout applied when a timeout rule somehow has no duration.
const FALLBACK_TIMEOUT_MS: u64 = 300_000;

/// Rolling history keeps at most this many messages per author...
const HISTORY_MAX_MESSAGES: usize = 50;
/// ...and nothing older than this.
const HISTORY_MAX_AGE_SECS: i64 = 60;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AutoModError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    InvalidRule(#[from] RuleValidationError),
}

/// A moderation action the platform refused or failed to apply.
#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("platform call failed: {0}")]
    Platform(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// Trait for persisting automod rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Enabled rules for a guild, in evaluation order (insertion order).
    async fn list_enabled(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError>;

    /// Every rule for a guild, enabled or not.
    async fn list_all(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError>;

    async fn create(&self, draft: RuleDraft) -> Result<AutoModRule, AutoModError>;

    async fn update(&self, rule: &AutoModRule) -> Result<(), AutoModError>;

    /// Returns true when a rule was actually removed.
    async fn delete(&self, guild_id: u64, rule_id: i64) -> Result<bool, AutoModError>;
}

/// Trait for the platform-side moderation capabilities the engine invokes.
/// Every method is best-effort from the engine's point of view.
#[async_trait]
pub trait ModerationGateway: Send + Sync {
    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), EnforcementError>;

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Duration,
        reason: &str,
    ) -> Result<(), EnforcementError>;

    async fn kick_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), EnforcementError>;

    async fn ban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), EnforcementError>;

    /// Private notice to the author. Best-effort by contract; callers only
    /// ever log a failure.
    async fn notify_user(&self, user_id: u64, message: &str) -> Result<(), EnforcementError>;
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AutoModEngine<R, V, M, A>
where
    R: RuleStore,
    V: ViolationStore,
    M: ModerationGateway,
    A: AuditSink,
{
    rules: R,
    violations: Arc<ViolationTracker<V>>,
    gateway: M,
    audit: Arc<A>,
    // (author, guild) -> recent messages, newest last.
    history: DashMap<(u64, u64), VecDeque<HistoryEntry>>,
}

impl<R, V, M, A> AutoModEngine<R, V, M, A>
where
    R: RuleStore,
    V: ViolationStore,
    M: ModerationGateway,
    A: AuditSink,
{
    pub fn new(rules: R, violations: Arc<ViolationTracker<V>>, gateway: M, audit: Arc<A>) -> Self {
        Self {
            rules,
            violations,
            gateway,
            audit,
            history: DashMap::new(),
        }
    }

    /// Evaluate one message. At most one rule fires per event.
    pub async fn evaluate(
        &self,
        event: &ModerationEvent,
    ) -> Result<EvaluationOutcome, AutoModError> {
        // Owners, administrators, and manage-messages holders are exempt
        // from every rule; nothing is recorded for them.
        if event.author_is_owner || event.author_is_admin {
            return Ok(EvaluationOutcome::Bypassed);
        }

        // Record before detection so spam/repeated_text see this message.
        self.remember(event);
        let history = self.history_snapshot(event);

        let rules = self.rules.list_enabled(event.guild_id).await?;

        for rule in &rules {
            if rule
                .exempt_roles
                .iter()
                .any(|role| event.author_role_ids.contains(role))
            {
                continue;
            }
            if rule.exempt_channels.contains(&event.channel_id) {
                continue;
            }

            if detectors::matches(rule, event, &history) {
                tracing::info!(
                    guild_id = event.guild_id,
                    author_id = event.author_id,
                    rule_id = rule.id,
                    rule_type = %rule.rule_type,
                    action = %rule.action,
                    "automod rule matched"
                );
                self.enforce(rule, event).await;
                return Ok(EvaluationOutcome::Matched {
                    rule_id: rule.id,
                    rule_type: rule.rule_type,
                    action: rule.action,
                });
            }
        }

        Ok(EvaluationOutcome::Clean)
    }

    /// Apply a matched rule. Nothing in here propagates: deletion, the
    /// action, the notice, and even violation recording each fail
    /// independently.
    async fn enforce(&self, rule: &AutoModRule, event: &ModerationEvent) {
        if rule.action != RuleAction::Warn {
            if let Err(e) = self
                .gateway
                .delete_message(event.channel_id, event.message_id)
                .await
            {
                tracing::warn!(message_id = event.message_id, "failed to delete message: {e}");
            }
        }

        if let Err(e) = self
            .violations
            .record(event.author_id, event.guild_id, rule.rule_type)
            .await
        {
            tracing::error!(
                author_id = event.author_id,
                guild_id = event.guild_id,
                "failed to record violation: {e}"
            );
        }

        let reason = format!("Automod: {} rule #{}", rule.rule_type, rule.id);
        let action_result = match rule.action {
            RuleAction::Delete | RuleAction::Warn => Ok(()),
            RuleAction::Timeout => {
                let duration =
                    Duration::from_millis(rule.duration_ms.unwrap_or(FALLBACK_TIMEOUT_MS));
                self.gateway
                    .timeout_member(event.guild_id, event.author_id, duration, &reason)
                    .await
            }
            RuleAction::Kick => {
                self.gateway
                    .kick_member(event.guild_id, event.author_id, &reason)
                    .await
            }
            RuleAction::Ban => {
                self.gateway
                    .ban_member(event.guild_id, event.author_id, &reason)
                    .await
            }
        };
        if let Err(e) = action_result {
            tracing::warn!(
                author_id = event.author_id,
                action = %rule.action,
                "enforcement action failed: {e}"
            );
        }

        self.audit
            .emit(AuditEntry::new(
                event.author_id,
                event.guild_id,
                format!("automod_{}", rule.rule_type),
                AuditCategory::RuleMatch,
                json!({
                    "rule_id": rule.id,
                    "action": rule.action.as_str(),
                    "channel_id": event.channel_id,
                    "message_id": event.message_id,
                }),
            ))
            .await;

        let notice = match rule.action {
            RuleAction::Warn => format!(
                "Your message tripped the {} filter. Please keep it within the server rules.",
                rule.rule_type
            ),
            RuleAction::Delete => format!(
                "Your message was removed by the {} filter.",
                rule.rule_type
            ),
            RuleAction::Timeout => format!(
                "You have been timed out: your message tripped the {} filter.",
                rule.rule_type
            ),
            RuleAction::Kick => format!(
                "You were kicked: your message tripped the {} filter.",
                rule.rule_type
            ),
            RuleAction::Ban => format!(
                "You were banned: your message tripped the {} filter.",
                rule.rule_type
            ),
        };
        if let Err(e) = self.gateway.notify_user(event.author_id, &notice).await {
            tracing::debug!(author_id = event.author_id, "could not notify author: {e}");
        }
    }

    fn remember(&self, event: &ModerationEvent) {
        let mut entries = self
            .history
            .entry((event.author_id, event.guild_id))
            .or_default();
        entries.push_back(HistoryEntry {
            content: event.content.clone(),
            timestamp: event.timestamp,
        });

        let horizon = event.timestamp - chrono::Duration::seconds(HISTORY_MAX_AGE_SECS);
        while let Some(front) = entries.front() {
            if front.timestamp < horizon || entries.len() > HISTORY_MAX_MESSAGES {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn history_snapshot(&self, event: &ModerationEvent) -> Vec<HistoryEntry> {
        self.history
            .get(&(event.author_id, event.guild_id))
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Rule administration, exposed to command collaborators.
    // ------------------------------------------------------------------

    #[allow(dead_code)]
    pub async fn create_rule(&self, draft: RuleDraft) -> Result<AutoModRule, AutoModError> {
        draft.validate()?;
        self.rules.create(draft).await
    }

    #[allow(dead_code)]
    pub async fn list_rules(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError> {
        self.rules.list_all(guild_id).await
    }

    #[allow(dead_code)]
    pub async fn update_rule(&self, rule: &AutoModRule) -> Result<(), AutoModError> {
        let draft = RuleDraft {
            guild_id: rule.guild_id,
            rule_type: rule.rule_type,
            enabled: rule.enabled,
            action: rule.action,
            threshold: rule.threshold,
            duration_ms: rule.duration_ms,
            allowlist: rule.allowlist.clone(),
            denylist: rule.denylist.clone(),
            exempt_roles: rule.exempt_roles.clone(),
            exempt_channels: rule.exempt_channels.clone(),
        };
        draft.validate()?;
        self.rules.update(rule).await
    }

    #[allow(dead_code)]
    pub async fn delete_rule(&self, guild_id: u64, rule_id: i64) -> Result<bool, AutoModError> {
        self.rules.delete(guild_id, rule_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::automod_models::RuleType;
    use crate::core::violations::{ViolationError, ViolationRecord};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    struct MockRuleStore {
        rules: Mutex<Vec<AutoModRule>>,
    }

    impl MockRuleStore {
        fn with(rules: Vec<AutoModRule>) -> Self {
            Self {
                rules: Mutex::new(rules),
            }
        }
    }

    #[async_trait]
    impl RuleStore for MockRuleStore {
        async fn list_enabled(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError> {
            Ok(self
                .rules
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.guild_id == guild_id && r.enabled)
                .cloned()
                .collect())
        }

        async fn list_all(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError> {
            Ok(self
                .rules
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.guild_id == guild_id)
                .cloned()
                .collect())
        }

        async fn create(&self, draft: RuleDraft) -> Result<AutoModRule, AutoModError> {
            let mut rules = self.rules.lock().unwrap();
            let now = Utc::now();
            let rule = AutoModRule {
                id: rules.len() as i64 + 1,
                guild_id: draft.guild_id,
                rule_type: draft.rule_type,
                enabled: draft.enabled,
                action: draft.action,
                threshold: draft.threshold,
                duration_ms: draft.duration_ms,
                allowlist: draft.allowlist,
                denylist: draft.denylist,
                exempt_roles: draft.exempt_roles,
                exempt_channels: draft.exempt_channels,
                created_at: now,
                updated_at: now,
            };
            rules.push(rule.clone());
            Ok(rule)
        }

        async fn update(&self, rule: &AutoModRule) -> Result<(), AutoModError> {
            let mut rules = self.rules.lock().unwrap();
            if let Some(existing) = rules.iter_mut().find(|r| r.id == rule.id) {
                *existing = rule.clone();
            }
            Ok(())
        }

        async fn delete(&self, guild_id: u64, rule_id: i64) -> Result<bool, AutoModError> {
            let mut rules = self.rules.lock().unwrap();
            let before = rules.len();
            rules.retain(|r| !(r.guild_id == guild_id && r.id == rule_id));
            Ok(rules.len() < before)
        }
    }

    struct MockViolationStore {
        counts: DashMap<(u64, u64, RuleType), u32>,
    }

    impl MockViolationStore {
        fn new() -> Self {
            Self {
                counts: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl ViolationStore for MockViolationStore {
        async fn record(
            &self,
            user_id: u64,
            guild_id: u64,
            violation_type: RuleType,
        ) -> Result<ViolationRecord, ViolationError> {
            let mut count = self
                .counts
                .entry((user_id, guild_id, violation_type))
                .or_insert(0);
            *count += 1;
            Ok(ViolationRecord {
                user_id,
                guild_id,
                violation_type,
                count: *count,
                last_violation_at: Utc::now(),
            })
        }

        async fn query(
            &self,
            guild_id: u64,
            user_id: Option<u64>,
        ) -> Result<Vec<ViolationRecord>, ViolationError> {
            Ok(self
                .counts
                .iter()
                .filter(|e| {
                    e.key().1 == guild_id && user_id.map(|u| e.key().0 == u).unwrap_or(true)
                })
                .map(|e| ViolationRecord {
                    user_id: e.key().0,
                    guild_id: e.key().1,
                    violation_type: e.key().2,
                    count: *e.value(),
                    last_violation_at: Utc::now(),
                })
                .collect())
        }

        async fn clear(
            &self,
            guild_id: u64,
            user_id: Option<u64>,
            violation_type: Option<RuleType>,
        ) -> Result<u64, ViolationError> {
            let before = self.counts.len();
            self.counts.retain(|key, _| {
                !(key.1 == guild_id
                    && user_id.map(|u| key.0 == u).unwrap_or(true)
                    && violation_type.map(|t| key.2 == t).unwrap_or(true))
            });
            Ok((before - self.counts.len()) as u64)
        }
    }

    #[derive(Default)]
    struct GatewayCalls {
        deletes: AtomicU32,
        timeouts: AtomicU32,
        kicks: AtomicU32,
        bans: AtomicU32,
        notices: AtomicU32,
        fail_all: AtomicBool,
    }

    #[derive(Clone, Default)]
    struct MockGateway {
        calls: Arc<GatewayCalls>,
    }

    impl MockGateway {
        fn result(&self) -> Result<(), EnforcementError> {
            if self.calls.fail_all.load(Ordering::SeqCst) {
                Err(EnforcementError::Platform("missing permission".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ModerationGateway for MockGateway {
        async fn delete_message(&self, _: u64, _: u64) -> Result<(), EnforcementError> {
            self.calls.deletes.fetch_add(1, Ordering::SeqCst);
            self.result()
        }

        async fn timeout_member(
            &self,
            _: u64,
            _: u64,
            _: Duration,
            _: &str,
        ) -> Result<(), EnforcementError> {
            self.calls.timeouts.fetch_add(1, Ordering::SeqCst);
            self.result()
        }

        async fn kick_member(&self, _: u64, _: u64, _: &str) -> Result<(), EnforcementError> {
            self.calls.kicks.fetch_add(1, Ordering::SeqCst);
            self.result()
        }

        async fn ban_member(&self, _: u64, _: u64, _: &str) -> Result<(), EnforcementError> {
            self.calls.bans.fetch_add(1, Ordering::SeqCst);
            self.result()
        }

        async fn notify_user(&self, _: u64, _: &str) -> Result<(), EnforcementError> {
            self.calls.notices.fetch_add(1, Ordering::SeqCst);
            self.result()
        }
    }

    #[derive(Default)]
    struct MockAuditSink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditSink for MockAuditSink {
        async fn emit(&self, entry: AuditEntry) {
            self.entries.lock().unwrap().push(entry);
        }
    }

    type TestEngine = AutoModEngine<MockRuleStore, MockViolationStore, MockGateway, MockAuditSink>;

    fn caps_rule(guild_id: u64) -> AutoModRule {
        let now = Utc::now();
        AutoModRule {
            id: 1,
            guild_id,
            rule_type: RuleType::Caps,
            enabled: true,
            action: RuleAction::Delete,
            threshold: Some(70),
            duration_ms: None,
            allowlist: Vec::new(),
            denylist: Vec::new(),
            exempt_roles: Vec::new(),
            exempt_channels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn engine_with(
        rules: Vec<AutoModRule>,
    ) -> (TestEngine, Arc<GatewayCalls>, Arc<MockAuditSink>) {
        let gateway = MockGateway::default();
        let calls = Arc::clone(&gateway.calls);
        let audit = Arc::new(MockAuditSink::default());
        let tracker = Arc::new(ViolationTracker::new(MockViolationStore::new()));
        let engine = AutoModEngine::new(
            MockRuleStore::with(rules),
            tracker,
            gateway,
            Arc::clone(&audit),
        );
        (engine, calls, audit)
    }

    fn shouting_event(guild_id: u64) -> ModerationEvent {
        ModerationEvent {
            author_id: 42,
            guild_id,
            channel_id: 100,
            message_id: 1000,
            content: "THIS IS ALL CAPS TEXT".to_string(),
            mention_count: 0,
            author_role_ids: Vec::new(),
            author_is_owner: false,
            author_is_admin: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn matched_rule_deletes_records_and_audits_once() {
        let (engine, gateway, audit) = engine_with(vec![caps_rule(10)]);

        let outcome = engine.evaluate(&shouting_event(10)).await.unwrap();

        assert!(matches!(
            outcome,
            EvaluationOutcome::Matched {
                rule_id: 1,
                rule_type: RuleType::Caps,
                action: RuleAction::Delete,
            }
        ));
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 1);

        let violations = engine.violations.for_user(10, 42).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].count, 1);
        assert_eq!(violations[0].violation_type, RuleType::Caps);

        let entries = audit.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, AuditCategory::RuleMatch);
        assert_eq!(entries[0].action, "automod_caps");
    }

    #[tokio::test]
    async fn admins_and_owners_bypass_everything() {
        let (engine, gateway, _) = engine_with(vec![caps_rule(10)]);

        let mut event = shouting_event(10);
        event.author_is_admin = true;
        assert_eq!(
            engine.evaluate(&event).await.unwrap(),
            EvaluationOutcome::Bypassed
        );

        let mut event = shouting_event(10);
        event.author_is_owner = true;
        assert_eq!(
            engine.evaluate(&event).await.unwrap(),
            EvaluationOutcome::Bypassed
        );

        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exempt_role_never_triggers_any_rule() {
        let mut rule = caps_rule(10);
        rule.exempt_roles = vec![777];
        let (engine, gateway, _) = engine_with(vec![rule]);

        let mut event = shouting_event(10);
        event.author_role_ids = vec![555, 777];

        assert_eq!(
            engine.evaluate(&event).await.unwrap(),
            EvaluationOutcome::Clean
        );
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exempt_role_bypasses_every_detector_type() {
        // One rule per detector type, all exempting role 777, against a
        // message built to trip every one of them.
        let types = [
            RuleType::Spam,
            RuleType::Caps,
            RuleType::Mentions,
            RuleType::Links,
            RuleType::Invites,
            RuleType::Profanity,
            RuleType::Zalgo,
            RuleType::RepeatedText,
            RuleType::EmojiSpam,
            RuleType::Custom,
        ];
        let rules = types
            .iter()
            .enumerate()
            .map(|(i, rule_type)| {
                let mut rule = caps_rule(10);
                rule.id = i as i64 + 1;
                rule.rule_type = *rule_type;
                rule.threshold = Some(1);
                rule.denylist = vec!["shout".to_string()];
                rule.exempt_roles = vec![777];
                rule
            })
            .collect();
        let (engine, gateway, audit) = engine_with(rules);

        let mut event = shouting_event(10);
        event.content = format!(
            "SHOUT SHIT discord.gg/abc https://evil.example {}{}",
            "\u{0301}".repeat(12),
            "😀".repeat(12),
        );
        event.mention_count = 10;
        event.author_role_ids = vec![777];

        for _ in 0..5 {
            assert_eq!(
                engine.evaluate(&event).await.unwrap(),
                EvaluationOutcome::Clean
            );
        }
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 0);
        assert!(audit.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exempt_channel_skips_the_rule() {
        let mut rule = caps_rule(10);
        rule.exempt_channels = vec![100];
        let (engine, gateway, _) = engine_with(vec![rule]);

        assert_eq!(
            engine.evaluate(&shouting_event(10)).await.unwrap(),
            EvaluationOutcome::Clean
        );
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let caps = caps_rule(10);
        let mut mentions = caps_rule(10);
        mentions.id = 2;
        mentions.rule_type = RuleType::Mentions;
        mentions.threshold = Some(1);
        mentions.action = RuleAction::Ban;
        let (engine, gateway, audit) = engine_with(vec![caps, mentions]);

        let mut event = shouting_event(10);
        event.mention_count = 10; // would also match the mention rule

        let outcome = engine.evaluate(&event).await.unwrap();
        assert!(matches!(
            outcome,
            EvaluationOutcome::Matched { rule_id: 1, .. }
        ));
        assert_eq!(gateway.bans.load(Ordering::SeqCst), 0);
        assert_eq!(audit.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn warn_action_keeps_the_message() {
        let mut rule = caps_rule(10);
        rule.action = RuleAction::Warn;
        let (engine, gateway, _) = engine_with(vec![rule]);

        engine.evaluate(&shouting_event(10)).await.unwrap();

        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.notices.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_action_times_out_the_member() {
        let mut rule = caps_rule(10);
        rule.action = RuleAction::Timeout;
        rule.duration_ms = Some(60_000);
        let (engine, gateway, _) = engine_with(vec![rule]);

        engine.evaluate(&shouting_event(10)).await.unwrap();

        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.timeouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gateway_failures_do_not_stop_recording_or_audit() {
        let (engine, gateway, audit) = engine_with(vec![caps_rule(10)]);
        gateway.fail_all.store(true, Ordering::SeqCst);

        let outcome = engine.evaluate(&shouting_event(10)).await.unwrap();

        assert!(matches!(outcome, EvaluationOutcome::Matched { .. }));
        let violations = engine.violations.for_user(10, 42).await.unwrap();
        assert_eq!(violations[0].count, 1);
        assert_eq!(audit.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spam_rule_uses_rolling_history() {
        let mut rule = caps_rule(10);
        rule.rule_type = RuleType::Spam;
        rule.threshold = Some(3);
        let (engine, _, _) = engine_with(vec![rule]);

        let mut event = shouting_event(10);
        event.content = "hello".to_string();

        assert_eq!(
            engine.evaluate(&event).await.unwrap(),
            EvaluationOutcome::Clean
        );
        assert_eq!(
            engine.evaluate(&event).await.unwrap(),
            EvaluationOutcome::Clean
        );
        assert!(matches!(
            engine.evaluate(&event).await.unwrap(),
            EvaluationOutcome::Matched { .. }
        ));
    }

    #[tokio::test]
    async fn create_rule_validates_the_draft() {
        let (engine, _, _) = engine_with(vec![]);

        let bad = RuleDraft::new(10, RuleType::Caps, RuleAction::Timeout);
        assert!(matches!(
            engine.create_rule(bad).await,
            Err(AutoModError::InvalidRule(
                RuleValidationError::MissingTimeoutDuration
            ))
        ));

        let mut good = RuleDraft::new(10, RuleType::Caps, RuleAction::Delete);
        good.threshold = Some(70);
        let created = engine.create_rule(good).await.unwrap();
        assert_eq!(created.guild_id, 10);
        assert_eq!(engine.list_rules(10).await.unwrap().len(), 1);
    }
}
