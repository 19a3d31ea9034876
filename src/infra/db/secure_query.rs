// Secure dynamic query layer over the SQLite pool.
//
// Every persistence operation in the subsystem goes through this module;
// nothing else issues SQL. Three rules hold everywhere:
// - identifiers (tables, columns) are validated against the allow-lists in
//   identifiers.rs before they reach query text
// - values only ever travel as positional bind parameters
// - update/delete without conditions is a hard error, raised before any
//   SQL is built
//
// The raw() escape hatch keeps parameterization but additionally scans the
// statement text for injection indicators; that scan is a second layer on
// top of parameterization, not a replacement for it.

use super::identifiers::{escape_column, escape_table};
use crate::core::audit::{AuditCategory, AuditEntry, AuditSink};
use serde_json::json;
use sqlx::sqlite::{SqliteConnection, SqliteQueryResult, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Statements that run longer than this are logged.
const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(1);

/// Default per-statement deadline, overridable per call.
const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// How much statement text ends up in logs and errors. Parameter values are
/// never logged at all.
const MAX_LOGGED_SQL: usize = 200;

/// Fragments that mark a raw statement as hostile. Lowercased comparison.
const SUSPICIOUS_FRAGMENTS: &[&str] = &[
    "--",
    "/*",
    "union select",
    "or 1=1",
    "or '1'='1",
    "; drop ",
    "; delete ",
    "; update ",
    "xp_cmdshell",
    "waitfor delay",
];

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("identifier {name:?} is not an allowed {kind}")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("{operation} requires a non-empty column set")]
    EmptyConditions { operation: &'static str },

    #[error("suspicious SQL rejected (matched {0:?})")]
    SuspiciousInput(&'static str),

    #[error("statement exceeded {timeout_ms}ms: {sql}")]
    Timeout { timeout_ms: u128, sql: String },

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ============================================================================
// VALUES AND OPTIONS
// ============================================================================

/// A value bound into a statement. Keeping this a closed enum means there
/// is no path for a caller to smuggle text into SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    #[allow(dead_code)]
    Real(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Discord snowflakes are u64; SQLite stores them as i64.
    pub fn id(value: u64) -> Self {
        SqlValue::Integer(value as i64)
    }

    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(value.into())
    }
}

/// Who is performing a sensitive mutation, for audit forwarding.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: u64,
    pub guild_id: u64,
    pub action: String,
}

impl ActorContext {
    pub fn new(actor_id: u64, guild_id: u64, action: impl Into<String>) -> Self {
        Self {
            actor_id,
            guild_id,
            action: action.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Per-statement deadline; defaults to 30s.
    pub timeout: Option<Duration>,
    /// When set on a mutating call, the mutation is forwarded to the audit
    /// sink.
    pub actor: Option<ActorContext>,
}

impl QueryOptions {
    pub fn with_actor(actor: ActorContext) -> Self {
        Self {
            timeout: None,
            actor: Some(actor),
        }
    }
}

/// Conflict handling for `insert`.
#[derive(Debug, Clone)]
pub enum OnConflict {
    /// Plain insert; a conflict is an error.
    None,
    DoNothing {
        target: Vec<String>,
    },
    /// `SET col = excluded.col` for `set_excluded`, `SET col = col + 1`
    /// for `increment` (counter upserts).
    DoUpdate {
        target: Vec<String>,
        set_excluded: Vec<String>,
        increment: Vec<String>,
    },
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// SQLite transaction modes.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    Deferred,
    Immediate,
    Exclusive,
}

impl IsolationLevel {
    fn begin_sql(self) -> &'static str {
        match self {
            IsolationLevel::Deferred => "BEGIN DEFERRED",
            IsolationLevel::Immediate => "BEGIN IMMEDIATE",
            IsolationLevel::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Work run inside `transaction`. Callers write
/// `|conn: &mut SqliteConnection| Box::pin(async move { ... })`.
pub type TxWork<'c, T> = Pin<Box<dyn Future<Output = Result<T, QueryError>> + Send + 'c>>;

// ============================================================================
// QUERY LAYER
// ============================================================================

#[derive(Clone)]
pub struct SafeQueries {
    pool: Pool<Sqlite>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl SafeQueries {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool, audit: None }
    }

    /// Forward sensitive mutations and rejected input to an audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// `SELECT columns FROM table [WHERE ...] [ORDER BY ...]`. An empty
    /// column list selects `*`.
    pub async fn select(
        &self,
        table: &str,
        columns: &[&str],
        conditions: &[(&str, SqlValue)],
        order_by: Option<&str>,
        opts: &QueryOptions,
    ) -> Result<Vec<SqliteRow>, QueryError> {
        let table = escape_table(table)?;

        let column_list = if columns.is_empty() {
            "*".to_string()
        } else {
            let mut validated = Vec::with_capacity(columns.len());
            for column in columns {
                validated.push(escape_column(column)?);
            }
            validated.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", column_list, table);
        if !conditions.is_empty() {
            sql.push_str(&where_clause(conditions)?);
        }
        if let Some(column) = order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(escape_column(column)?);
        }

        let params: Vec<SqlValue> = conditions.iter().map(|(_, v)| v.clone()).collect();
        self.fetch_rows(&sql, &params, opts).await
    }

    #[allow(dead_code)]
    pub async fn count(
        &self,
        table: &str,
        conditions: &[(&str, SqlValue)],
        opts: &QueryOptions,
    ) -> Result<i64, QueryError> {
        let table = escape_table(table)?;

        let mut sql = format!("SELECT COUNT(*) FROM {}", table);
        if !conditions.is_empty() {
            sql.push_str(&where_clause(conditions)?);
        }

        let params: Vec<SqlValue> = conditions.iter().map(|(_, v)| v.clone()).collect();
        let rows = self.fetch_rows(&sql, &params, opts).await?;
        let row = rows.first().ok_or_else(|| {
            QueryError::Database(sqlx::Error::RowNotFound)
        })?;
        Ok(row.get::<i64, _>(0))
    }

    #[allow(dead_code)]
    pub async fn exists(
        &self,
        table: &str,
        conditions: &[(&str, SqlValue)],
        opts: &QueryOptions,
    ) -> Result<bool, QueryError> {
        Ok(self.count(table, conditions, opts).await? > 0)
    }

    /// `INSERT INTO table (...) VALUES (...)` with optional conflict
    /// handling. Conflict targets and update columns go through the same
    /// identifier validation as everything else.
    pub async fn insert(
        &self,
        table: &str,
        values: &[(&str, SqlValue)],
        on_conflict: &OnConflict,
        opts: &QueryOptions,
    ) -> Result<WriteOutcome, QueryError> {
        let table = escape_table(table)?;
        if values.is_empty() {
            return Err(QueryError::EmptyConditions {
                operation: "insert",
            });
        }

        let mut columns = Vec::with_capacity(values.len());
        for (column, _) in values {
            columns.push(escape_column(column)?);
        }
        let placeholders = vec!["?"; values.len()].join(", ");

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );
        sql.push_str(&conflict_clause(on_conflict)?);

        let params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        let result = self.execute_sql(&sql, &params, opts).await?;
        self.forward_mutation_audit("insert", table, opts).await;

        Ok(WriteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// `UPDATE table SET ... WHERE ...`. Refuses to run without conditions.
    pub async fn update(
        &self,
        table: &str,
        values: &[(&str, SqlValue)],
        conditions: &[(&str, SqlValue)],
        opts: &QueryOptions,
    ) -> Result<u64, QueryError> {
        let table = escape_table(table)?;
        if values.is_empty() {
            return Err(QueryError::EmptyConditions {
                operation: "update",
            });
        }
        if conditions.is_empty() {
            // Unconditional mutation is a hard error, never a warning.
            return Err(QueryError::EmptyConditions {
                operation: "update",
            });
        }

        let mut assignments = Vec::with_capacity(values.len());
        for (column, _) in values {
            assignments.push(format!("{} = ?", escape_column(column)?));
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        sql.push_str(&where_clause(conditions)?);

        let mut params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        params.extend(conditions.iter().map(|(_, v)| v.clone()));

        let result = self.execute_sql(&sql, &params, opts).await?;
        self.forward_mutation_audit("update", table, opts).await;
        Ok(result.rows_affected())
    }

    /// `DELETE FROM table WHERE ...`. Refuses to run without conditions.
    pub async fn delete(
        &self,
        table: &str,
        conditions: &[(&str, SqlValue)],
        opts: &QueryOptions,
    ) -> Result<u64, QueryError> {
        let table = escape_table(table)?;
        if conditions.is_empty() {
            return Err(QueryError::EmptyConditions {
                operation: "delete",
            });
        }

        let mut sql = format!("DELETE FROM {}", table);
        sql.push_str(&where_clause(conditions)?);

        let params: Vec<SqlValue> = conditions.iter().map(|(_, v)| v.clone()).collect();
        let result = self.execute_sql(&sql, &params, opts).await?;
        self.forward_mutation_audit("delete", table, opts).await;
        Ok(result.rows_affected())
    }

    /// Escape hatch for statements the builders cannot express (DDL,
    /// aggregate reports). Values still bind positionally, and the literal
    /// SQL is scanned for injection indicators first.
    pub async fn raw(
        &self,
        sql: &str,
        params: &[SqlValue],
        opts: &QueryOptions,
    ) -> Result<Vec<SqliteRow>, QueryError> {
        if let Some(fragment) = suspicious_fragment(sql) {
            tracing::warn!(
                fragment,
                sql = %truncate_sql(sql),
                "rejected suspicious raw SQL"
            );
            if let Some(audit) = &self.audit {
                let (actor_id, guild_id) = opts
                    .actor
                    .as_ref()
                    .map(|a| (a.actor_id, a.guild_id))
                    .unwrap_or((0, 0));
                audit
                    .emit(AuditEntry::new(
                        actor_id,
                        guild_id,
                        "raw_query_rejected",
                        AuditCategory::SuspiciousInput,
                        json!({ "fragment": fragment, "sql": truncate_sql(sql) }),
                    ))
                    .await;
            }
            return Err(QueryError::SuspiciousInput(fragment));
        }

        self.fetch_rows(sql, params, opts).await
    }

    /// Run `work` inside a transaction: `BEGIN` (optionally with an
    /// isolation mode), commit on `Ok`, roll back on `Err`. The pooled
    /// connection goes back to the pool on every exit path.
    #[allow(dead_code)]
    pub async fn transaction<T, F>(
        &self,
        isolation: Option<IsolationLevel>,
        work: F,
    ) -> Result<T, QueryError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> TxWork<'c, T> + Send,
    {
        let mut conn = self.pool.acquire().await?;

        let begin = isolation.map(IsolationLevel::begin_sql).unwrap_or("BEGIN");
        sqlx::query(begin).execute(&mut *conn).await?;

        match work(&mut *conn).await {
            Ok(value) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| QueryError::Transaction(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::error!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    /// Create the subsystem's tables and indexes.
    pub async fn migrate(&self) -> Result<(), QueryError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS warnings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                actor_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                value TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (guild_id, name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS automod_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                rule_type TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                action TEXT NOT NULL,
                threshold INTEGER,
                duration_ms INTEGER,
                allowlist TEXT NOT NULL DEFAULT '[]',
                denylist TEXT NOT NULL DEFAULT '[]',
                exempt_roles TEXT NOT NULL DEFAULT '[]',
                exempt_channels TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_automod_rules_guild
                ON automod_rules(guild_id, enabled)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS violations (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                violation_type TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 1,
                last_violation_at TEXT NOT NULL,
                PRIMARY KEY (user_id, guild_id, violation_type)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                actor_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                category TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_violations_guild
                ON violations(guild_id, user_id)
            "#,
        ];

        let opts = QueryOptions::default();
        for statement in statements {
            self.raw(statement, &[], &opts).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution plumbing
    // ------------------------------------------------------------------

    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[SqlValue],
        opts: &QueryOptions,
    ) -> Result<Vec<SqliteRow>, QueryError> {
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }

        let limit = opts.timeout.unwrap_or(DEFAULT_STATEMENT_TIMEOUT);
        let started = Instant::now();
        let outcome = tokio::time::timeout(limit, query.fetch_all(&self.pool)).await;
        finish(sql, started, limit, outcome)
    }

    async fn execute_sql(
        &self,
        sql: &str,
        params: &[SqlValue],
        opts: &QueryOptions,
    ) -> Result<SqliteQueryResult, QueryError> {
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }

        let limit = opts.timeout.unwrap_or(DEFAULT_STATEMENT_TIMEOUT);
        let started = Instant::now();
        let outcome = tokio::time::timeout(limit, query.execute(&self.pool)).await;
        finish(sql, started, limit, outcome)
    }

    async fn forward_mutation_audit(&self, operation: &str, table: &str, opts: &QueryOptions) {
        let (Some(audit), Some(actor)) = (&self.audit, &opts.actor) else {
            return;
        };
        audit
            .emit(AuditEntry::new(
                actor.actor_id,
                actor.guild_id,
                actor.action.clone(),
                AuditCategory::Admin,
                json!({ "operation": operation, "table": table }),
            ))
            .await;
    }
}

fn where_clause(conditions: &[(&str, SqlValue)]) -> Result<String, QueryError> {
    let mut parts = Vec::with_capacity(conditions.len());
    for (column, _) in conditions {
        parts.push(format!("{} = ?", escape_column(column)?));
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn conflict_clause(on_conflict: &OnConflict) -> Result<String, QueryError> {
    match on_conflict {
        OnConflict::None => Ok(String::new()),
        OnConflict::DoNothing { target } => {
            let target = validate_all(target)?;
            Ok(format!(" ON CONFLICT({}) DO NOTHING", target.join(", ")))
        }
        OnConflict::DoUpdate {
            target,
            set_excluded,
            increment,
        } => {
            if set_excluded.is_empty() && increment.is_empty() {
                return Err(QueryError::EmptyConditions {
                    operation: "upsert",
                });
            }
            let target = validate_all(target)?;
            let mut assignments = Vec::new();
            for column in set_excluded {
                let column = escape_column(column)?;
                assignments.push(format!("{} = excluded.{}", column, column));
            }
            for column in increment {
                let column = escape_column(column)?;
                assignments.push(format!("{} = {} + 1", column, column));
            }
            Ok(format!(
                " ON CONFLICT({}) DO UPDATE SET {}",
                target.join(", "),
                assignments.join(", ")
            ))
        }
    }
}

fn validate_all(columns: &[String]) -> Result<Vec<&str>, QueryError> {
    let mut validated = Vec::with_capacity(columns.len());
    for column in columns {
        validated.push(escape_column(column)?);
    }
    Ok(validated)
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &'q SqlValue,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Null => query.bind(Option::<i64>::None),
    }
}

fn suspicious_fragment(sql: &str) -> Option<&'static str> {
    let lowered = sql.to_lowercase();
    SUSPICIOUS_FRAGMENTS
        .iter()
        .find(|fragment| lowered.contains(*fragment))
        .copied()
}

fn truncate_sql(sql: &str) -> String {
    let trimmed: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    trimmed.chars().take(MAX_LOGGED_SQL).collect()
}

fn finish<T>(
    sql: &str,
    started: Instant,
    limit: Duration,
    outcome: Result<Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
) -> Result<T, QueryError> {
    let elapsed = started.elapsed();
    if elapsed >= SLOW_QUERY_THRESHOLD {
        tracing::warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            sql = %truncate_sql(sql),
            "slow query"
        );
    }

    match outcome {
        Err(_) => Err(QueryError::Timeout {
            timeout_ms: limit.as_millis(),
            sql: truncate_sql(sql),
        }),
        Ok(inner) => inner.map_err(QueryError::Database),
    }
}

// ============================================================================
// TESTS
// ============================================================================
