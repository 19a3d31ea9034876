// Identifier whitelisting for dynamically-built SQL.
//
// Table and column names are the only parts of a statement that cannot be
// bound as parameters, so they are validated against closed sets before
// they ever reach query text. Membership is the rule; the shape check is a
// second gate on top, not a substitute.

use super::secure_query::QueryError;

/// Every table the subsystem is allowed to touch.
pub const ALLOWED_TABLES: &[&str] = &[
    "users",
    "warnings",
    "guild_settings",
    "automod_rules",
    "violations",
    "audit_log",
];

/// Every fixed column across those tables.
pub const ALLOWED_COLUMNS: &[&str] = &[
    "id",
    "guild_id",
    "user_id",
    "actor_id",
    "username",
    "reason",
    "name",
    "value",
    "rule_type",
    "enabled",
    "action",
    "threshold",
    "duration_ms",
    "allowlist",
    "denylist",
    "exempt_roles",
    "exempt_channels",
    "violation_type",
    "count",
    "category",
    "details",
    "created_at",
    "updated_at",
    "last_violation_at",
];

/// Dynamically-named columns are allowed when they carry one of these
/// prefixes (and still pass the shape check).
pub const ALLOWED_COLUMN_PREFIXES: &[&str] = &["metadata_", "custom_", "setting_", "stat_"];

/// `^[A-Za-z_][A-Za-z0-9_]*$`
fn well_formed(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a table name for use in SQL text. Passing validation requires
/// membership in the allow-list, not just a benign shape.
pub fn escape_table(name: &str) -> Result<&str, QueryError> {
    if well_formed(name) && ALLOWED_TABLES.contains(&name) {
        Ok(name)
    } else {
        Err(QueryError::InvalidIdentifier {
            kind: "table",
            name: name.to_string(),
        })
    }
}

/// Validate a column name for use in SQL text.
pub fn escape_column(name: &str) -> Result<&str, QueryError> {
    if !well_formed(name) {
        return Err(QueryError::InvalidIdentifier {
            kind: "column",
            name: name.to_string(),
        });
    }

    let prefixed = ALLOWED_COLUMN_PREFIXES
        .iter()
        .any(|prefix| matches!(name.strip_prefix(prefix), Some(rest) if !rest.is_empty()));

    if ALLOWED_COLUMNS.contains(&name) || prefixed {
        Ok(name)
    } else {
        Err(QueryError::InvalidIdentifier {
            kind: "column",
            name: name.to_string(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
