//! Stutter normalization for raw transcripts.
//!
//! Dysarthric and stuttered speech produces transcripts like
//! `"li-li-light on"` or `"light light on"`. The normalizer collapses
//! these artifacts in four ordered passes:
//!
//! 1. Hyphenated repeated syllables of 1–2 letters (`li-li-light` → `light`)
//! 2. Single-letter repeats (`l-l-light` → `light`)
//! 3. A short hyphenated prefix of the following word (`li-light` → `light`)
//! 4. Adjacent duplicate whole words (`light light on` → `light on`)
//!
//! The function is idempotent: re-applying it to its own output changes
//! nothing. Comparisons are case-insensitive; kept words preserve their
//! original casing, and non-ASCII text passes through untouched.

/// Result of normalizing one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Cleaned text, single-space separated.
    pub text: String,
    /// Whether any stutter artifact was collapsed.
    pub collapsed_repeats: bool,
}

/// Normalize a raw transcript, returning only the cleaned text.
pub fn normalize(raw: &str) -> String {
    normalize_detailed(raw).text
}

/// Normalize a raw transcript, reporting whether anything was collapsed.
///
/// The report feeds `SpeechPattern::has_repeated_sounds`.
pub fn normalize_detailed(raw: &str) -> Normalized {
    let mut collapsed = false;

    // Passes 1–3 operate per token on hyphenated stutter prefixes.
    let tokens: Vec<String> = raw
        .split_whitespace()
        .map(|token| {
            let (word, changed) = collapse_stutter_token(token);
            collapsed |= changed;
            word
        })
        .collect();

    // Pass 4: drop adjacent duplicate whole words (case-insensitive).
    let mut kept: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if kept
            .last()
            .is_some_and(|prev| prev.to_lowercase() == token.to_lowercase())
        {
            collapsed = true;
            continue;
        }
        kept.push(token);
    }

    Normalized {
        text: kept.join(" "),
        collapsed_repeats: collapsed,
    }
}

/// Collapse hyphenated stutter prefixes within a single token.
///
/// `li-li-light`, `l-l-light` and `li-light` all reduce to `light`: every
/// leading hyphen segment must be 1–2 letters and a case-insensitive
/// prefix of the final segment. Real hyphenated words (`mother-in-law`,
/// `t-shirt`) fail one of those checks and pass through unchanged.
fn collapse_stutter_token(token: &str) -> (String, bool) {
    let segments: Vec<&str> = token.split('-').collect();
    if segments.len() < 2 {
        return (token.to_owned(), false);
    }

    let last = segments[segments.len() - 1];
    if last.is_empty() {
        return (token.to_owned(), false);
    }
    let last_lower = last.to_lowercase();

    let is_stutter = segments[..segments.len() - 1].iter().all(|seg| {
        let len = seg.chars().count();
        (1..=2).contains(&len) && last_lower.starts_with(&seg.to_lowercase())
    });

    if is_stutter {
        (last.to_owned(), true)
    } else {
        (token.to_owned(), false)
    }
}
