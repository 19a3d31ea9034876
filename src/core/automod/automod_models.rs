// Automod domain models - rules, events, and outcomes.
//
// These are pure domain types with no Discord dependencies. The discord
// layer builds `ModerationEvent`s from gateway messages and translates
// enforcement back into API calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The content checks a rule can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Spam,
    Caps,
    Mentions,
    Links,
    Invites,
    Profanity,
    Zalgo,
    RepeatedText,
    EmojiSpam,
    Custom,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Spam => "spam",
            RuleType::Caps => "caps",
            RuleType::Mentions => "mentions",
            RuleType::Links => "links",
            RuleType::Invites => "invites",
            RuleType::Profanity => "profanity",
            RuleType::Zalgo => "zalgo",
            RuleType::RepeatedText => "repeated_text",
            RuleType::EmojiSpam => "emoji_spam",
            RuleType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = RuleValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spam" => Ok(RuleType::Spam),
            "caps" => Ok(RuleType::Caps),
            "mentions" => Ok(RuleType::Mentions),
            "links" => Ok(RuleType::Links),
            "invites" => Ok(RuleType::Invites),
            "profanity" => Ok(RuleType::Profanity),
            "zalgo" => Ok(RuleType::Zalgo),
            "repeated_text" => Ok(RuleType::RepeatedText),
            "emoji_spam" => Ok(RuleType::EmojiSpam),
            "custom" => Ok(RuleType::Custom),
            other => Err(RuleValidationError::UnknownRuleType(other.to_string())),
        }
    }
}

/// What happens when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Delete,
    Warn,
    Timeout,
    Kick,
    Ban,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Delete => "delete",
            RuleAction::Warn => "warn",
            RuleAction::Timeout => "timeout",
            RuleAction::Kick => "kick",
            RuleAction::Ban => "ban",
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = RuleValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(RuleAction::Delete),
            "warn" => Ok(RuleAction::Warn),
            "timeout" => Ok(RuleAction::Timeout),
            "kick" => Ok(RuleAction::Kick),
            "ban" => Ok(RuleAction::Ban),
            other => Err(RuleValidationError::UnknownAction(other.to_string())),
        }
    }
}

/// Why an admin-supplied rule was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleValidationError {
    #[error("threshold must be at least 1")]
    ThresholdTooLow,

    #[error("timeout rules require a duration")]
    MissingTimeoutDuration,

    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// A configured automod rule for one guild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoModRule {
    pub id: i64,
    pub guild_id: u64,
    pub rule_type: RuleType,
    pub enabled: bool,
    pub action: RuleAction,
    /// Detector-specific threshold (caps percentage, spam message count,
    /// mention count, repeated message count, emoji count).
    pub threshold: Option<u32>,
    /// Timeout length in milliseconds; required when `action` is timeout.
    pub duration_ms: Option<u64>,
    /// Terms/URLs that never count as a match.
    pub allowlist: Vec<String>,
    /// Extra terms that do count as a match (profanity/custom).
    pub denylist: Vec<String>,
    /// Role ids exempt from this rule.
    pub exempt_roles: Vec<u64>,
    /// Channel ids exempt from this rule.
    pub exempt_channels: Vec<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A rule as submitted by an admin, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub guild_id: u64,
    pub rule_type: RuleType,
    pub enabled: bool,
    pub action: RuleAction,
    pub threshold: Option<u32>,
    pub duration_ms: Option<u64>,
    pub allowlist: Vec<String>,
    pub denylist: Vec<String>,
    pub exempt_roles: Vec<u64>,
    pub exempt_channels: Vec<u64>,
}

impl RuleDraft {
    pub fn new(guild_id: u64, rule_type: RuleType, action: RuleAction) -> Self {
        Self {
            guild_id,
            rule_type,
            enabled: true,
            action,
            threshold: None,
            duration_ms: None,
            allowlist: Vec::new(),
            denylist: Vec::new(),
            exempt_roles: Vec::new(),
            exempt_channels: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if let Some(threshold) = self.threshold {
            if threshold < 1 {
                return Err(RuleValidationError::ThresholdTooLow);
            }
        }
        if self.action == RuleAction::Timeout && self.duration_ms.is_none() {
            return Err(RuleValidationError::MissingTimeoutDuration);
        }
        Ok(())
    }
}

/// One inbound message, as seen by the engine.
#[derive(Debug, Clone)]
pub struct ModerationEvent {
    pub author_id: u64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub content: String,
    /// User + role mentions, counted by the platform adapter.
    pub mention_count: u32,
    pub author_role_ids: Vec<u64>,
    pub author_is_owner: bool,
    /// Administrator or manage-messages capability (bot operators are
    /// folded in by the adapter).
    pub author_is_admin: bool,
    pub timestamp: DateTime<Utc>,
}

/// One entry of the rolling per-author message history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// What `evaluate` did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Author is exempt from all rules; nothing was checked.
    Bypassed,
    /// No enabled rule matched.
    Clean,
    /// A rule matched and enforcement ran. Only ever one per event.
    Matched {
        rule_id: i64,
        rule_type: RuleType,
        action: RuleAction,
    },
}
