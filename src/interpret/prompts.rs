//! Instruction-template selection for the semantic-completion collaborator.
//!
//! The template *content* belongs to the collaborator; only the selection
//! rule lives here: each speech pattern type maps to a distinct
//! instruction style, so a dysarthric utterance is completed differently
//! from an aphasic one.

use serde::{Deserialize, Serialize};

use crate::types::PatternType;

/// Instruction style the collaborator should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// Urgency detected: extract the need, assume distress, be brief.
    Urgent,
    /// Fragmented output with intact intent: fill in dropped words.
    Aphasia,
    /// Unclear pronunciation with intact grammar: repair phonetics.
    Dysarthria,
    /// Ordinary speech: light cleanup only.
    Standard,
}

/// Select the instruction style for a classified pattern type.
pub fn style_for(pattern: PatternType) -> PromptStyle {
    match pattern {
        PatternType::Critical | PatternType::Urgent | PatternType::Important => PromptStyle::Urgent,
        PatternType::Aphasia => PromptStyle::Aphasia,
        PatternType::Dysarthria => PromptStyle::Dysarthria,
        PatternType::Standard => PromptStyle::Standard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_pattern_maps_to_expected_style() {
        assert_eq!(style_for(PatternType::Critical), PromptStyle::Urgent);
        assert_eq!(style_for(PatternType::Urgent), PromptStyle::Urgent);
        assert_eq!(style_for(PatternType::Important), PromptStyle::Urgent);
        assert_eq!(style_for(PatternType::Aphasia), PromptStyle::Aphasia);
        assert_eq!(style_for(PatternType::Dysarthria), PromptStyle::Dysarthria);
        assert_eq!(style_for(PatternType::Standard), PromptStyle::Standard);
    }
}
