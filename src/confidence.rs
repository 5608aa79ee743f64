//! Contextual confidence scoring for interpretations.
//!
//! Combines a locally computed score with the external interpreter's
//! self-reported confidence. The combination is deliberately asymmetric:
//!
//! - **Non-urgent**: `min(external, local)` — the local score acts as a
//!   skeptical cap on calm over-claims.
//! - **Urgent**: `max(external, 85)` — a generous floor, because acting
//!   on an urgent utterance beats second-guessing it.

use crate::types::{PatternType, SpeechPattern, UrgencyLevel};

/// Lower and upper clamp for non-urgent confidence.
pub const CONFIDENCE_MIN: u8 = 10;
pub const CONFIDENCE_MAX: u8 = 99;

/// Floor applied to urgent interpretations.
pub const URGENCY_FLOOR: u8 = 85;

/// Default assumed external confidence when the interpreter reports none.
const DEFAULT_EXTERNAL: u8 = 50;

/// Signals feeding one scoring decision.
#[derive(Debug, Clone)]
pub struct ScoreInputs<'a> {
    /// Classified pattern for the utterance.
    pub pattern: &'a SpeechPattern,
    /// Interpreter-reported confidence (0–100), if any.
    pub external_confidence: Option<u8>,
    /// Whether a visual-context object is lexically contained in the
    /// interpreted text.
    pub visual_overlap: bool,
    /// Number of prior conversation turns.
    pub history_len: usize,
    /// Word count of the interpreted text.
    pub interpreted_word_count: usize,
}

/// Compute the final confidence for an interpretation.
///
/// The generous floor applies only to emergency tiers (critical,
/// urgent); important-tier input is scored like any other, with the +15
/// urgency bonus feeding the local cap.
pub fn score(inputs: &ScoreInputs<'_>) -> u8 {
    if inputs.pattern.urgency.is_some_and(UrgencyLevel::is_emergency) {
        return inputs
            .external_confidence
            .unwrap_or(URGENCY_FLOOR)
            .max(URGENCY_FLOOR);
    }

    let local = local_score(inputs);
    let external = inputs.external_confidence.unwrap_or(DEFAULT_EXTERNAL);
    // The external value is unclamped input; re-clamp after combining.
    external.min(local).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Local score: base 50 plus bounded contextual adjustments, clamped to
/// \[[`CONFIDENCE_MIN`], [`CONFIDENCE_MAX`]\].
fn local_score(inputs: &ScoreInputs<'_>) -> u8 {
    let mut score: i32 = 50;

    if inputs.visual_overlap {
        score += 20;
    }
    if inputs.history_len > 0 {
        score += 10;
    }
    if (2..=15).contains(&inputs.interpreted_word_count) {
        score += 10;
    }
    if inputs.pattern.pattern == PatternType::Standard {
        score += 10;
    }
    if inputs.pattern.is_fragmented {
        score -= 10;
    }
    if inputs.pattern.urgency.is_some() {
        score += 15;
    }

    score.clamp(i32::from(CONFIDENCE_MIN), i32::from(CONFIDENCE_MAX)) as u8
}

/// Whether any detected object is lexically contained in the interpreted
/// text (case-insensitive).
pub fn visual_overlap(objects: &[String], interpreted: &str) -> bool {
    let lower = interpreted.to_lowercase();
    objects
        .iter()
        .any(|obj| !obj.is_empty() && lower.contains(&obj.to_lowercase()))
}
