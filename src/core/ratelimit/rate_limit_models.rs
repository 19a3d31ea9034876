// Rate limiting domain models.
//
// These are pure in-memory types; nothing here touches the database or
// Discord. The limiter itself lives in rate_limit_service.rs.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A named rate limit policy. Callers always select policies by name so the
/// actual numbers stay in one auditable place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed inside one window.
    pub max_requests: u32,
    /// Length of the fixed window.
    pub window: Duration,
    /// Optional human-readable message returned to limited callers.
    pub message: Option<String>,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One fixed-window counter.
///
/// `reset_at` only ever moves forward; `count` is monotonic within a window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Outcome of a rate limit check. Being limited is an expected, frequent
/// result, so it is a value rather than an error.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub limited: bool,
    /// How long the caller should wait before retrying.
    #[allow(dead_code)]
    pub retry_after: Option<Duration>,
    /// Human-readable message for the caller, when the policy has one.
    #[allow(dead_code)]
    pub message: Option<String>,
    /// True exactly once per key: on the call that pushed it into the
    /// blacklist.
    pub escalated: bool,
}

impl RateLimitDecision {
    pub fn allowed() -> Self {
        Self {
            limited: false,
            retry_after: None,
            message: None,
            escalated: false,
        }
    }

    pub fn limited(retry_after: Duration, message: Option<String>) -> Self {
        Self {
            limited: true,
            retry_after: Some(retry_after),
            message,
            escalated: false,
        }
    }

    pub fn blacklisted(retry_after: Duration, escalated: bool) -> Self {
        Self {
            limited: true,
            retry_after: Some(retry_after),
            message: Some(BLACKLIST_MESSAGE.to_string()),
            escalated,
        }
    }
}

/// Snapshot of a single key, for admin inspection.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub count: u32,
    /// Time left in the current window. Zero when the window has elapsed.
    pub window_remaining: Duration,
    /// Time left on the blacklist, if the key is blacklisted.
    pub blacklisted_for: Option<Duration>,
}

/// Aggregate limiter state, for observability.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterMetrics {
    pub tracked_keys: usize,
    pub blacklisted_keys: usize,
    /// Hottest keys by current window count, descending.
    pub top_offenders: Vec<(String, u32)>,
}

pub const BLACKLIST_MESSAGE: &str =
    "You have been temporarily blocked for repeatedly exceeding rate limits. Try again later.";

/// How long an escalated key stays blacklisted.
pub const ESCALATION_BLACKLIST: Duration = Duration::from_secs(60 * 60);

/// A key is escalated once its count passes this multiple of the policy cap.
pub const ESCALATION_FACTOR: u32 = 3;
