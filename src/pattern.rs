//! Heuristic speech-pattern classifier.
//!
//! Labels each utterance with an urgency tier and a disorder-pattern
//! type. Two passes over the text:
//!
//! 1. **Urgency scan** — three fixed keyword tiers checked in priority
//!    order (critical, then urgent, then important); the first tier with
//!    any match wins. Matching tolerates the truncated tokens dysarthric
//!    speech produces (`"hel pai"` still reaches the urgent tier).
//! 2. **Pattern resolution** — fragmentation heuristics combined with the
//!    profile's declared conditions.
//!
//! The classifier is pure and allocation-light; it runs on every
//! finalized transcript before any collaborator is consulted.

use crate::normalize::Normalized;
use crate::types::{PatternType, SpeechCondition, SpeechPattern, UrgencyLevel, UserProfile};

// ── Keyword tables ──────────────────────────────────────────────────────

/// (tier, keywords) in priority order. Single-word entries match by
/// bidirectional prefix against tokens; multi-word entries match by
/// substring against the lowercased text.
const URGENCY_TIERS: &[(UrgencyLevel, &[&str])] = &[
    (
        UrgencyLevel::Critical,
        &[
            "can't breathe",
            "cant breathe",
            "breath",
            "breathing",
            "chest",
            "heart attack",
            "stroke",
            "dying",
            "choking",
            "unconscious",
            "emergency",
            "911",
        ],
    ),
    (
        UrgencyLevel::Urgent,
        &[
            "pain", "hurt", "fall", "fell", "fallen", "help", "bathroom", "toilet", "dizzy",
            "bleeding", "sick",
        ],
    ),
    (
        UrgencyLevel::Important,
        &[
            "hungry",
            "thirsty",
            "cold",
            "hot",
            "tired",
            "medication",
            "medicine",
            "water",
            "blanket",
            "uncomfortable",
            "itchy",
        ],
    ),
];

/// Verbs that, with no following object, indicate a fragmented command.
const ACTION_VERBS: &[&str] = &[
    "turn", "switch", "open", "close", "want", "need", "get", "make", "put", "go",
];

/// Particles that may trail a bare action verb without supplying an object.
const PARTICLES: &[&str] = &["on", "off", "up", "down"];

/// Minimum token length for prefix-based keyword matching. Shorter
/// fragments ("i", "a", "to") are too ambiguous to act on.
const MIN_PREFIX_TOKEN_LEN: usize = 3;

// ── Classification ──────────────────────────────────────────────────────

/// Classify one utterance given its raw text, the normalizer output, and
/// the speaker's profile.
pub fn classify(raw: &str, normalized: &Normalized, profile: &UserProfile) -> SpeechPattern {
    let urgency = detect_urgency(raw).or_else(|| detect_urgency(&normalized.text));
    let fragmented = is_fragmented(&normalized.text);
    let word_count = normalized.text.split_whitespace().count();

    // Precedence is deliberate: a fragmented utterance from a profile
    // declaring aphasia resolves to aphasia even when dysarthria is also
    // declared.
    let pattern = if let Some(level) = urgency {
        PatternType::from(level)
    } else if fragmented && profile.declares(SpeechCondition::Aphasia) {
        PatternType::Aphasia
    } else if profile.declares(SpeechCondition::Dysarthria) {
        PatternType::Dysarthria
    } else if fragmented {
        PatternType::Aphasia
    } else {
        PatternType::Standard
    };

    SpeechPattern {
        pattern,
        is_fragmented: fragmented,
        has_repeated_sounds: normalized.collapsed_repeats,
        word_count,
        urgency,
    }
}

/// Scan the urgency tiers in priority order; first tier with any match wins.
pub fn detect_urgency(text: &str) -> Option<UrgencyLevel> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();

    for &(level, keywords) in URGENCY_TIERS {
        let hit = keywords.iter().any(|kw| {
            if kw.contains(' ') {
                lower.contains(kw)
            } else {
                tokens.iter().any(|tok| token_matches(tok, kw))
            }
        });
        if hit {
            return Some(level);
        }
    }
    None
}

/// Token-level keyword match tolerant of clipped dysarthric speech.
///
/// `"hel"` matches `"help"`, `"breathing"` matches `"breath"`; but a
/// two-letter fragment never prefix-matches, and unrelated words fail.
fn token_matches(token: &str, keyword: &str) -> bool {
    let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
    if token == keyword {
        return true;
    }
    if token.chars().count() >= MIN_PREFIX_TOKEN_LEN && keyword.starts_with(token) {
        return true;
    }
    keyword.chars().count() >= MIN_PREFIX_TOKEN_LEN && token.starts_with(keyword)
}

/// Fragmentation heuristics: multiple pause markers, runs of very short
/// tokens, or a bare action verb with no object.
fn is_fragmented(text: &str) -> bool {
    let pause_markers = text.matches("...").count() + text.matches('…').count();
    if pause_markers >= 2 {
        return true;
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();

    // A run of three or more clipped tokens.
    let mut run = 0usize;
    for tok in &tokens {
        if tok.chars().count() <= 2 {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 0;
        }
    }

    // Bare action verb: "turn", "want", "turn on" — verb with no object.
    let lower: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    match lower.as_slice() {
        [verb] => ACTION_VERBS.contains(&verb.as_str()),
        [verb, particle] => {
            ACTION_VERBS.contains(&verb.as_str()) && PARTICLES.contains(&particle.as_str())
        }
        _ => false,
    }
}
