// Fixed-window rate limiter with automatic temporary blacklisting.
//
// Semantics:
// - Fixed-window counters, not a sliding log. A client can burst up to
//   ~2x max_requests across a window boundary; in exchange a check is O(1)
//   in time and memory per key.
// - The blacklist is consulted before any window logic. A blacklisted key
//   is always limited, regardless of its counter.
// - A key whose count passes 3x its policy cap is blacklisted for an hour.
//
// All state is per-process. Running several bot processes gives each one
// independent counters.
//
// `check` is deliberately synchronous: the read-modify-write of a counter
// must not be split by an await point, or a key could be incremented twice
// for one event.

use super::rate_limit_models::{
    RateLimitDecision, RateLimitPolicy, RateLimitStatus, RateLimiterMetrics, WindowEntry,
    ESCALATION_BLACKLIST, ESCALATION_FACTOR,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub const DEFAULT_POLICY: &str = "default";

/// How many keys `metrics` reports as top offenders.
const TOP_OFFENDERS: usize = 5;

pub struct RateLimiter {
    entries: DashMap<String, WindowEntry>,
    blacklist: DashMap<String, Instant>,
    policies: DashMap<String, RateLimitPolicy>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a limiter with the built-in policy set registered.
    pub fn new() -> Self {
        let limiter = Self {
            entries: DashMap::new(),
            blacklist: DashMap::new(),
            policies: DashMap::new(),
        };

        limiter.configure(
            DEFAULT_POLICY,
            RateLimitPolicy::new(20, Duration::from_secs(60))
                .with_message("Slow down - you are sending requests too quickly."),
        );
        limiter.configure(
            "economy",
            RateLimitPolicy::new(10, Duration::from_secs(60))
                .with_message("Economy commands are limited. Give it a minute."),
        );
        limiter.configure(
            "admin",
            RateLimitPolicy::new(10, Duration::from_secs(30))
                .with_message("Too many admin actions. Wait a moment."),
        );
        limiter.configure(
            "api",
            RateLimitPolicy::new(60, Duration::from_secs(60))
                .with_message("API quota exceeded. Retry shortly."),
        );
        limiter.configure(
            "heavy",
            RateLimitPolicy::new(5, Duration::from_secs(300))
                .with_message("That operation is expensive. Try again in a few minutes."),
        );

        limiter
    }

    /// Register or override a named policy.
    pub fn configure(&self, name: impl Into<String>, policy: RateLimitPolicy) {
        self.policies.insert(name.into(), policy);
    }

    /// Check (and count) one request for `key` under the named policy.
    pub fn check(&self, key: &str, policy_name: &str) -> RateLimitDecision {
        let now = Instant::now();

        // Blacklist wins over everything, including a fresh window.
        if let Some(expiry) = self.blacklist.get(key).map(|e| *e.value()) {
            if now < expiry {
                return RateLimitDecision::blacklisted(expiry - now, false);
            }
            // Expired entry; lazily drop it and fall through to window logic.
            self.blacklist.remove(key);
        }

        let policy = self.policy(policy_name);

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + policy.window,
            });

        if now >= entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + policy.window;
            return RateLimitDecision::allowed();
        }

        entry.count += 1;

        if entry.count > policy.max_requests.saturating_mul(ESCALATION_FACTOR) {
            let count = entry.count;
            drop(entry);
            self.blacklist
                .insert(key.to_string(), now + ESCALATION_BLACKLIST);
            tracing::warn!(key, count, "rate limit key escalated to blacklist");
            return RateLimitDecision::blacklisted(ESCALATION_BLACKLIST, true);
        }

        if entry.count > policy.max_requests {
            let retry_after = entry.reset_at - now;
            return RateLimitDecision::limited(retry_after, policy.message.clone());
        }

        RateLimitDecision::allowed()
    }

    /// Drop the window counter for a key. Does not touch the blacklist.
    #[allow(dead_code)]
    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    #[allow(dead_code)]
    pub fn add_to_blacklist(&self, key: impl Into<String>, duration: Duration) {
        self.blacklist.insert(key.into(), Instant::now() + duration);
    }

    /// Returns true when the key was actually blacklisted.
    #[allow(dead_code)]
    pub fn remove_from_blacklist(&self, key: &str) -> bool {
        self.blacklist.remove(key).is_some()
    }

    /// Snapshot a single key. `None` when the key is neither tracked nor
    /// blacklisted.
    #[allow(dead_code)]
    pub fn status(&self, key: &str) -> Option<RateLimitStatus> {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|e| e.value().clone());
        let blacklisted_for = self
            .blacklist
            .get(key)
            .map(|e| *e.value())
            .filter(|expiry| *expiry > now)
            .map(|expiry| expiry - now);

        match (entry, blacklisted_for) {
            (None, None) => None,
            (entry, blacklisted_for) => Some(RateLimitStatus {
                count: entry.as_ref().map(|e| e.count).unwrap_or(0),
                window_remaining: entry
                    .map(|e| e.reset_at.saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO),
                blacklisted_for,
            }),
        }
    }

    #[allow(dead_code)]
    pub fn metrics(&self) -> RateLimiterMetrics {
        let mut counts: Vec<(String, u32)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(TOP_OFFENDERS);

        RateLimiterMetrics {
            tracked_keys: self.entries.len(),
            blacklisted_keys: self.blacklist.len(),
            top_offenders: counts,
        }
    }

    /// Remove entries whose window or blacklist expiry has passed. Returns
    /// (window entries removed, blacklist entries removed).
    pub fn sweep(&self) -> (usize, usize) {
        let now = Instant::now();

        let before_entries = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at > now);

        let before_blacklist = self.blacklist.len();
        self.blacklist.retain(|_, expiry| *expiry > now);

        (
            before_entries - self.entries.len(),
            before_blacklist - self.blacklist.len(),
        )
    }

    /// Start the periodic sweep. The returned handle stops the task when
    /// dropped or when `stop` is called, so tests and shutdown stay
    /// deterministic.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let limiter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let (windows, blacklist) = limiter.sweep();
                if windows + blacklist > 0 {
                    tracing::debug!(windows, blacklist, "rate limiter sweep removed entries");
                }
            }
        });

        SweeperHandle { handle }
    }

    fn policy(&self, name: &str) -> RateLimitPolicy {
        if let Some(policy) = self.policies.get(name) {
            return policy.clone();
        }
        tracing::warn!(policy = name, "unknown rate limit policy, using default");
        self.policies
            .get(DEFAULT_POLICY)
            .map(|p| p.clone())
            .unwrap_or_else(|| RateLimitPolicy::new(20, Duration::from_secs(60)))
    }
}

/// Handle to the background sweep task.
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// TESTS
// ============================================================================
