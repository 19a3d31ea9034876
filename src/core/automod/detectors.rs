// Content detectors - one pure function per rule type.
//
// Detectors only see the event, the rule configuration, and the author's
// rolling history. No storage, no Discord, no hidden state; everything here
// is unit-testable in isolation.

use super::automod_models::{AutoModRule, HistoryEntry, ModerationEvent, RuleType};
use regex::Regex;
use std::sync::LazyLock;

// Defaults, used when a rule has no threshold of its own.
pub const CAPS_MIN_LENGTH: usize = 10;
pub const DEFAULT_CAPS_THRESHOLD: u32 = 70;
pub const SPAM_WINDOW_SECS: i64 = 10;
pub const DEFAULT_SPAM_THRESHOLD: u32 = 5;
pub const DEFAULT_MENTION_THRESHOLD: u32 = 5;
pub const ZALGO_MAX_COMBINING: usize = 10;
pub const DEFAULT_REPEAT_COUNT: u32 = 3;
pub const DEFAULT_EMOJI_THRESHOLD: u32 = 10;

static INVITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:discord\.gg|discord(?:app)?\.com/invite)/[A-Za-z0-9-]+")
        .expect("invite pattern is valid")
});

static CUSTOM_EMOJI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a?:\w+:\d+>").expect("custom emoji pattern is valid"));

/// Built-in profanity terms, always active for `profanity` rules. Rules can
/// extend the list via their denylist and carve exceptions via their
/// allowlist.
const BUILTIN_PROFANITY: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "cunt", "bastard", "dickhead", "slut", "whore",
];

/// Run the detector registered for `rule.rule_type`.
pub fn matches(rule: &AutoModRule, event: &ModerationEvent, history: &[HistoryEntry]) -> bool {
    match rule.rule_type {
        RuleType::Caps => excessive_caps(&event.content, rule.threshold),
        RuleType::Spam => message_flood(history, rule.threshold, event),
        RuleType::Mentions => mention_spam(event.mention_count, rule.threshold),
        RuleType::Links => unapproved_link(&event.content, &rule.allowlist),
        RuleType::Invites => invite_link(&event.content),
        RuleType::Profanity => {
            banned_term(&event.content, &rule.denylist, &rule.allowlist, true)
        }
        RuleType::Zalgo => zalgo(&event.content),
        RuleType::RepeatedText => repeated_text(history, rule.threshold),
        RuleType::EmojiSpam => emoji_spam(&event.content, rule.threshold),
        RuleType::Custom => banned_term(&event.content, &rule.denylist, &rule.allowlist, false),
    }
}

/// Uppercase letters / total letters, as an inclusive percentage bound.
/// Short messages are ignored entirely.
fn excessive_caps(content: &str, threshold: Option<u32>) -> bool {
    if content.chars().count() < CAPS_MIN_LENGTH {
        return false;
    }

    let threshold = threshold.unwrap_or(DEFAULT_CAPS_THRESHOLD) as usize;
    let mut letters = 0usize;
    let mut uppercase = 0usize;
    for c in content.chars() {
        if c.is_alphabetic() {
            letters += 1;
            if c.is_uppercase() {
                uppercase += 1;
            }
        }
    }

    // Integer cross-multiplication keeps the boundary exact.
    letters > 0 && uppercase * 100 >= threshold * letters
}

/// Message count from this author inside the rolling window, current
/// message included.
fn message_flood(history: &[HistoryEntry], threshold: Option<u32>, event: &ModerationEvent) -> bool {
    let threshold = threshold.unwrap_or(DEFAULT_SPAM_THRESHOLD) as usize;
    let window_start = event.timestamp - chrono::Duration::seconds(SPAM_WINDOW_SECS);
    let recent = history
        .iter()
        .filter(|entry| entry.timestamp >= window_start)
        .count();
    recent >= threshold
}

fn mention_spam(mention_count: u32, threshold: Option<u32>) -> bool {
    mention_count >= threshold.unwrap_or(DEFAULT_MENTION_THRESHOLD)
}

/// Any http(s) URL not covered by the rule allowlist.
fn unapproved_link(content: &str, allowlist: &[String]) -> bool {
    for token in content.split_whitespace() {
        let url = match token.find("http://").or_else(|| token.find("https://")) {
            Some(at) => &token[at..],
            None => continue,
        };
        let lowered = url.to_lowercase();
        let approved = allowlist
            .iter()
            .any(|entry| !entry.is_empty() && lowered.contains(&entry.to_lowercase()));
        if !approved {
            return true;
        }
    }
    false
}

fn invite_link(content: &str) -> bool {
    INVITE_PATTERN.is_match(content)
}

/// Substring scan against a denylist, suppressed when an allowlisted term
/// occurs anywhere in the message. `include_builtin` distinguishes
/// `profanity` rules from `custom` rules.
fn banned_term(
    content: &str,
    denylist: &[String],
    allowlist: &[String],
    include_builtin: bool,
) -> bool {
    let lowered = content.to_lowercase();

    if allowlist
        .iter()
        .any(|term| !term.is_empty() && lowered.contains(&term.to_lowercase()))
    {
        return false;
    }

    if include_builtin && BUILTIN_PROFANITY.iter().any(|term| lowered.contains(term)) {
        return true;
    }

    denylist
        .iter()
        .any(|term| !term.is_empty() && lowered.contains(&term.to_lowercase()))
}

/// More than 10 Unicode combining marks means the text is being stacked.
fn zalgo(content: &str) -> bool {
    content.chars().filter(|c| is_combining_mark(*c)).count() > ZALGO_MAX_COMBINING
}

fn is_combining_mark(c: char) -> bool {
    matches!(
        c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F
    )
}

/// Last N history entries (current message included) are char-for-char
/// identical.
fn repeated_text(history: &[HistoryEntry], threshold: Option<u32>) -> bool {
    let needed = threshold.unwrap_or(DEFAULT_REPEAT_COUNT) as usize;
    if needed == 0 || history.len() < needed {
        return false;
    }

    let tail = &history[history.len() - needed..];
    let first = &tail[0].content;
    !first.is_empty() && tail.iter().all(|entry| entry.content == *first)
}

/// Standard emoji characters plus custom emoji tokens (`<:name:id>`).
fn emoji_spam(content: &str, threshold: Option<u32>) -> bool {
    let threshold = threshold.unwrap_or(DEFAULT_EMOJI_THRESHOLD) as usize;
    let unicode = content.chars().filter(|c| is_emoji_char(*c)).count();
    let custom = CUSTOM_EMOJI_PATTERN.find_iter(content).count();
    unicode + custom >= threshold
}

fn is_emoji_char(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F5FF // symbols & pictographs
            | 0x1F600..=0x1F64F // emoticons
            | 0x1F680..=0x1F6FF // transport
            | 0x1F900..=0x1F9FF // supplemental symbols
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x26FF // misc symbols
            | 0x2700..=0x27BF // dingbats
            | 0x1F1E6..=0x1F1FF // regional indicators
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::automod_models::RuleAction;
    use chrono::{Duration, Utc};

    fn rule(rule_type: RuleType) -> AutoModRule {
        let now = Utc::now();
        AutoModRule {
            id: 1,
            guild_id: 10,
            rule_type,
            enabled: true,
            action: RuleAction::Delete,
            threshold: None,
            duration_ms: None,
            allowlist: Vec::new(),
            denylist: Vec::new(),
            exempt_roles: Vec::new(),
            exempt_channels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn event(content: &str) -> ModerationEvent {
        ModerationEvent {
            author_id: 1,
            guild_id: 10,
            channel_id: 100,
            message_id: 1000,
            content: content.to_string(),
            mention_count: 0,
            author_role_ids: Vec::new(),
            author_is_owner: false,
            author_is_admin: false,
            timestamp: Utc::now(),
        }
    }

    fn history_of(contents: &[&str]) -> Vec<HistoryEntry> {
        let now = Utc::now();
        contents
            .iter()
            .map(|c| HistoryEntry {
                content: c.to_string(),
                timestamp: now,
            })
            .collect()
    }

    #[test]
    fn caps_flags_shouting_above_threshold() {
        let mut caps = rule(RuleType::Caps);
        caps.threshold = Some(70);

        assert!(matches(&caps, &event("THIS IS ALL CAPS TEXT"), &[]));
        assert!(!matches(&caps, &event("this is a calm message"), &[]));
    }

    #[test]
    fn caps_ignores_short_messages() {
        let caps = rule(RuleType::Caps);
        assert!(!matches(&caps, &event("STOP IT"), &[]));
    }

    #[test]
    fn caps_threshold_boundary_is_inclusive() {
        let mut caps = rule(RuleType::Caps);
        caps.threshold = Some(70);

        // 100 letters: 70 uppercase is exactly 70%, 69 is just under.
        let at_boundary = format!("{}{}", "A".repeat(70), "a".repeat(30));
        let below_boundary = format!("{}{}", "A".repeat(69), "a".repeat(31));
        assert!(matches(&caps, &event(&at_boundary), &[]));
        assert!(!matches(&caps, &event(&below_boundary), &[]));
    }

    #[test]
    fn spam_counts_messages_inside_the_window() {
        let spam = rule(RuleType::Spam);
        let ev = event("hi");

        assert!(!matches(&spam, &ev, &history_of(&["a", "b", "c", "d"])));
        assert!(matches(&spam, &ev, &history_of(&["a", "b", "c", "d", "e"])));
    }

    #[test]
    fn spam_ignores_messages_outside_the_window() {
        let spam = rule(RuleType::Spam);
        let ev = event("hi");
        let stale = Utc::now() - Duration::seconds(SPAM_WINDOW_SECS + 5);

        let mut history = history_of(&["a", "b", "c", "d"]);
        history.push(HistoryEntry {
            content: "old".to_string(),
            timestamp: stale,
        });

        assert!(!matches(&spam, &ev, &history));
    }

    #[test]
    fn mention_threshold_is_inclusive() {
        let mentions = rule(RuleType::Mentions);

        let mut ev = event("hello everyone");
        ev.mention_count = 4;
        assert!(!matches(&mentions, &ev, &[]));
        ev.mention_count = 5;
        assert!(matches(&mentions, &ev, &[]));
    }

    #[test]
    fn links_respect_the_allowlist() {
        let mut links = rule(RuleType::Links);
        links.allowlist = vec!["github.com".to_string()];

        assert!(!matches(
            &links,
            &event("see https://github.com/rust-lang/rust"),
            &[]
        ));
        assert!(matches(&links, &event("buy at http://scam.example"), &[]));
        assert!(matches(
            &links,
            &event("ok https://github.com/x plus https://evil.example"),
            &[]
        ));
        assert!(!matches(&links, &event("no links here"), &[]));
    }

    #[test]
    fn invites_match_known_patterns() {
        let invites = rule(RuleType::Invites);

        assert!(matches(&invites, &event("join discord.gg/abc123"), &[]));
        assert!(matches(
            &invites,
            &event("https://discord.com/invite/xYz-9"),
            &[]
        ));
        assert!(matches(
            &invites,
            &event("DISCORDAPP.COM/INVITE/loud"),
            &[]
        ));
        assert!(!matches(&invites, &event("we talked on discord today"), &[]));
    }

    #[test]
    fn profanity_hits_builtin_and_rule_denylist() {
        let mut profanity = rule(RuleType::Profanity);
        profanity.denylist = vec!["heck".to_string()];

        assert!(matches(&profanity, &event("well SHIT happens"), &[]));
        assert!(matches(&profanity, &event("what the heck"), &[]));
        assert!(!matches(&profanity, &event("perfectly polite"), &[]));
    }

    #[test]
    fn profanity_is_suppressed_by_allowlisted_terms() {
        let mut profanity = rule(RuleType::Profanity);
        profanity.denylist = vec!["scunthorpe".to_string()];
        profanity.allowlist = vec!["scunthorpe united".to_string()];

        assert!(matches(&profanity, &event("scunthorpe!!"), &[]));
        assert!(!matches(
            &profanity,
            &event("scunthorpe united won again"),
            &[]
        ));
    }

    #[test]
    fn custom_ignores_builtin_terms() {
        let mut custom = rule(RuleType::Custom);
        custom.denylist = vec!["forbidden phrase".to_string()];

        assert!(matches(&custom, &event("the forbidden phrase appears"), &[]));
        // Builtin profanity is not part of custom rules.
        assert!(!matches(&custom, &event("well shit"), &[]));
    }

    #[test]
    fn zalgo_boundary_at_ten_marks() {
        let zalgo_rule = rule(RuleType::Zalgo);

        let ten = format!("h{}", "\u{0301}".repeat(10));
        let eleven = format!("h{}", "\u{0301}".repeat(11));
        assert!(!matches(&zalgo_rule, &event(&ten), &[]));
        assert!(matches(&zalgo_rule, &event(&eleven), &[]));
    }

    #[test]
    fn repeated_text_needs_n_identical_messages() {
        let repeat = rule(RuleType::RepeatedText);

        assert!(!matches(
            &repeat,
            &event("same"),
            &history_of(&["same", "same"])
        ));
        assert!(matches(
            &repeat,
            &event("same"),
            &history_of(&["same", "same", "same"])
        ));
        assert!(!matches(
            &repeat,
            &event("same"),
            &history_of(&["other", "same", "same"])
        ));
        // Only the tail matters.
        assert!(matches(
            &repeat,
            &event("same"),
            &history_of(&["other", "same", "same", "same"])
        ));
    }

    #[test]
    fn emoji_spam_counts_unicode_and_custom_tokens() {
        let emoji = rule(RuleType::EmojiSpam);

        let nine = "😀".repeat(9);
        let ten = "😀".repeat(10);
        assert!(!matches(&emoji, &event(&nine), &[]));
        assert!(matches(&emoji, &event(&ten), &[]));

        let mixed = format!("{} {}", "🔥".repeat(5), "<:pog:123456789> ".repeat(5));
        assert!(matches(&emoji, &event(&mixed), &[]));
    }

    #[test]
    fn custom_is_case_insensitive() {
        let mut custom = rule(RuleType::Custom);
        custom.denylist = vec!["Banned".to_string()];
        assert!(matches(&custom, &event("this is bAnNeD content"), &[]));
    }
}
