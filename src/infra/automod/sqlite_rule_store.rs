// SQLite-backed rule store for per-guild automod configuration.
//
// Rows live in the automod_rules table. The list-shaped columns
// (allowlist, denylist, exempt sets) are stored as JSON text. All access
// goes through SafeQueries; this module never builds SQL itself.

use crate::core::automod::{AutoModError, AutoModRule, RuleAction, RuleDraft, RuleStore, RuleType};
use crate::infra::db::{OnConflict, QueryOptions, SafeQueries, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const TABLE: &str = "automod_rules";

pub struct SqliteRuleStore {
    db: SafeQueries,
}

impl SqliteRuleStore {
    pub fn new(db: SafeQueries) -> Self {
        Self { db }
    }

    fn decode(row: &SqliteRow) -> Result<AutoModRule, AutoModError> {
        let rule_type: String = row.get("rule_type");
        let action: String = row.get("action");

        Ok(AutoModRule {
            id: row.get("id"),
            guild_id: row.get::<i64, _>("guild_id") as u64,
            rule_type: rule_type
                .parse::<RuleType>()
                .map_err(|e| AutoModError::Storage(e.to_string()))?,
            enabled: row.get("enabled"),
            action: action
                .parse::<RuleAction>()
                .map_err(|e| AutoModError::Storage(e.to_string()))?,
            threshold: row
                .get::<Option<i64>, _>("threshold")
                .map(|t| t as u32),
            duration_ms: row
                .get::<Option<i64>, _>("duration_ms")
                .map(|d| d as u64),
            allowlist: decode_strings(row.get("allowlist")),
            denylist: decode_strings(row.get("denylist")),
            exempt_roles: decode_ids(row.get("exempt_roles")),
            exempt_channels: decode_ids(row.get("exempt_channels")),
            created_at: parse_timestamp(row.get("created_at")),
            updated_at: parse_timestamp(row.get("updated_at")),
        })
    }
}

fn decode_strings(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn decode_ids(raw: String) -> Vec<u64> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn encode_strings(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn encode_ids(values: &[u64]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn list_enabled(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError> {
        let rows = self
            .db
            .select(
                TABLE,
                &[],
                &[
                    ("guild_id", SqlValue::id(guild_id)),
                    ("enabled", SqlValue::Bool(true)),
                ],
                Some("id"),
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| AutoModError::Storage(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn list_all(&self, guild_id: u64) -> Result<Vec<AutoModRule>, AutoModError> {
        let rows = self
            .db
            .select(
                TABLE,
                &[],
                &[("guild_id", SqlValue::id(guild_id))],
                Some("id"),
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| AutoModError::Storage(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn create(&self, draft: RuleDraft) -> Result<AutoModRule, AutoModError> {
        let now = Utc::now();
        let stamp = now.to_rfc3339();

        let outcome = self
            .db
            .insert(
                TABLE,
                &[
                    ("guild_id", SqlValue::id(draft.guild_id)),
                    ("rule_type", SqlValue::text(draft.rule_type.as_str())),
                    ("enabled", SqlValue::Bool(draft.enabled)),
                    ("action", SqlValue::text(draft.action.as_str())),
                    (
                        "threshold",
                        draft
                            .threshold
                            .map(|t| SqlValue::Integer(t as i64))
                            .unwrap_or(SqlValue::Null),
                    ),
                    (
                        "duration_ms",
                        draft
                            .duration_ms
                            .map(|d| SqlValue::Integer(d as i64))
                            .unwrap_or(SqlValue::Null),
                    ),
                    ("allowlist", SqlValue::text(encode_strings(&draft.allowlist))),
                    ("denylist", SqlValue::text(encode_strings(&draft.denylist))),
                    (
                        "exempt_roles",
                        SqlValue::text(encode_ids(&draft.exempt_roles)),
                    ),
                    (
                        "exempt_channels",
                        SqlValue::text(encode_ids(&draft.exempt_channels)),
                    ),
                    ("created_at", SqlValue::text(stamp.clone())),
                    ("updated_at", SqlValue::text(stamp)),
                ],
                &OnConflict::None,
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| AutoModError::Storage(e.to_string()))?;

        Ok(AutoModRule {
            id: outcome.last_insert_id,
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
        })
    }

    async fn update(&self, rule: &AutoModRule) -> Result<(), AutoModError> {
        self.db
            .update(
                TABLE,
                &[
                    ("rule_type", SqlValue::text(rule.rule_type.as_str())),
                    ("enabled", SqlValue::Bool(rule.enabled)),
                    ("action", SqlValue::text(rule.action.as_str())),
                    (
                        "threshold",
                        rule.threshold
                            .map(|t| SqlValue::Integer(t as i64))
                            .unwrap_or(SqlValue::Null),
                    ),
                    (
                        "duration_ms",
                        rule.duration_ms
                            .map(|d| SqlValue::Integer(d as i64))
                            .unwrap_or(SqlValue::Null),
                    ),
                    ("allowlist", SqlValue::text(encode_strings(&rule.allowlist))),
                    ("denylist", SqlValue::text(encode_strings(&rule.denylist))),
                    (
                        "exempt_roles",
                        SqlValue::text(encode_ids(&rule.exempt_roles)),
                    ),
                    (
                        "exempt_channels",
                        SqlValue::text(encode_ids(&rule.exempt_channels)),
                    ),
                    ("updated_at", SqlValue::text(Utc::now().to_rfc3339())),
                ],
                &[
                    ("id", SqlValue::Integer(rule.id)),
                    ("guild_id", SqlValue::id(rule.guild_id)),
                ],
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| AutoModError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, guild_id: u64, rule_id: i64) -> Result<bool, AutoModError> {
        let removed = self
            .db
            .delete(
                TABLE,
                &[
                    ("id", SqlValue::Integer(rule_id)),
                    ("guild_id", SqlValue::id(guild_id)),
                ],
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| AutoModError::Storage(e.to_string()))?;
        Ok(removed > 0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
