// SQLite-backed violation store.
//
// One row per (user, guild, violation type); recording a violation is an
// upsert that bumps the counter and stamps last_violation_at. All access
// goes through SafeQueries.

use crate::core::automod::RuleType;
use crate::core::violations::{ViolationError, ViolationRecord, ViolationStore};
use crate::infra::db::{OnConflict, QueryOptions, SafeQueries, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const TABLE: &str = "violations";

pub struct SqliteViolationStore {
    db: SafeQueries,
}

impl SqliteViolationStore {
    pub fn new(db: SafeQueries) -> Self {
        Self { db }
    }

    fn decode(row: &SqliteRow) -> Result<ViolationRecord, ViolationError> {
        let violation_type: String = row.get("violation_type");
        Ok(ViolationRecord {
            user_id: row.get::<i64, _>("user_id") as u64,
            guild_id: row.get::<i64, _>("guild_id") as u64,
            violation_type: violation_type
                .parse::<RuleType>()
                .map_err(|e| ViolationError::Storage(e.to_string()))?,
            count: row.get::<i64, _>("count") as u32,
            last_violation_at: parse_timestamp(row.get("last_violation_at")),
        })
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ViolationStore for SqliteViolationStore {
    async fn record(
        &self,
        user_id: u64,
        guild_id: u64,
        violation_type: RuleType,
    ) -> Result<ViolationRecord, ViolationError> {
        let now = Utc::now();

        self.db
            .insert(
                TABLE,
                &[
                    ("user_id", SqlValue::id(user_id)),
                    ("guild_id", SqlValue::id(guild_id)),
                    ("violation_type", SqlValue::text(violation_type.as_str())),
                    ("count", SqlValue::Integer(1)),
                    ("last_violation_at", SqlValue::text(now.to_rfc3339())),
                ],
                &OnConflict::DoUpdate {
                    target: vec![
                        "user_id".to_string(),
                        "guild_id".to_string(),
                        "violation_type".to_string(),
                    ],
                    set_excluded: vec!["last_violation_at".to_string()],
                    increment: vec!["count".to_string()],
                },
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| ViolationError::Storage(e.to_string()))?;

        // Read the row back for the updated count.
        let rows = self
            .db
            .select(
                TABLE,
                &[],
                &[
                    ("user_id", SqlValue::id(user_id)),
                    ("guild_id", SqlValue::id(guild_id)),
                    ("violation_type", SqlValue::text(violation_type.as_str())),
                ],
                None,
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| ViolationError::Storage(e.to_string()))?;

        rows.first()
            .ok_or_else(|| ViolationError::Storage("violation row missing after upsert".into()))
            .and_then(Self::decode)
    }

    async fn query(
        &self,
        guild_id: u64,
        user_id: Option<u64>,
    ) -> Result<Vec<ViolationRecord>, ViolationError> {
        let mut conditions = vec![("guild_id", SqlValue::id(guild_id))];
        if let Some(user_id) = user_id {
            conditions.push(("user_id", SqlValue::id(user_id)));
        }

        let rows = self
            .db
            .select(
                TABLE,
                &[],
                &conditions,
                Some("last_violation_at"),
                &QueryOptions::default(),
            )
            .await
            .map_err(|e| ViolationError::Storage(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn clear(
        &self,
        guild_id: u64,
        user_id: Option<u64>,
        violation_type: Option<RuleType>,
    ) -> Result<u64, ViolationError> {
        let mut conditions = vec![("guild_id", SqlValue::id(guild_id))];
        if let Some(user_id) = user_id {
            conditions.push(("user_id", SqlValue::id(user_id)));
        }
        if let Some(violation_type) = violation_type {
            conditions.push(("violation_type", SqlValue::text(violation_type.as_str())));
        }

        self.db
            .delete(TABLE, &conditions, &QueryOptions::default())
            .await
            .map_err(|e| ViolationError::Storage(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
