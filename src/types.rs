//! Core data model for the interpretation engine.
//!
//! Everything here is a plain structured value: the engine consumes and
//! produces these types, while transport and persistence belong to the
//! host application and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A finalized transcript awaiting interpretation.
///
/// Ephemeral: discarded after the utterance has been processed.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Unique id for tracing and supersession checks.
    pub id: Uuid,
    /// Raw transcript text as delivered by speech-to-text.
    pub text: String,
    /// When the finalized transcript arrived.
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    /// Wrap a finalized transcript, stamping id and arrival time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Urgency tier detected from an utterance.
///
/// `Critical` and `Urgent` bypass the confirmation protocol entirely;
/// `Important` is surfaced with priority but still confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    /// Non-emergency but relevant need (comfort, medication).
    Important,
    /// Caregiver-level need (pain, fall, bathroom).
    Urgent,
    /// Immediate life-threat (breathing, chest, stroke).
    Critical,
}

impl UrgencyLevel {
    /// Whether this tier bypasses the confirmation protocol.
    ///
    /// `Important` is surfaced with priority but still confirmed.
    pub fn is_emergency(self) -> bool {
        matches!(self, Self::Critical | Self::Urgent)
    }
}

/// Classified speech pattern type for an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Critical,
    Urgent,
    Important,
    /// Motor speech disorder: unclear pronunciation, intact grammar.
    Dysarthria,
    /// Language-processing disorder: fragmented output, intact intent.
    Aphasia,
    Standard,
}

impl From<UrgencyLevel> for PatternType {
    fn from(level: UrgencyLevel) -> Self {
        match level {
            UrgencyLevel::Critical => Self::Critical,
            UrgencyLevel::Urgent => Self::Urgent,
            UrgencyLevel::Important => Self::Important,
        }
    }
}

/// Per-utterance speech pattern analysis, computed fresh each time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechPattern {
    /// Resolved pattern type (urgency tier wins over disorder pattern).
    pub pattern: PatternType,
    /// Whether the utterance looks fragmented (pauses, clipped tokens,
    /// bare verbs with no object).
    pub is_fragmented: bool,
    /// Whether the normalizer collapsed any stutter artifacts.
    pub has_repeated_sounds: bool,
    /// Word count of the normalized text.
    pub word_count: usize,
    /// Detected urgency tier, if any keyword tier matched.
    pub urgency: Option<UrgencyLevel>,
}

/// Scene analysis delivered by the vision collaborator.
///
/// Read-only and consumed per utterance; never persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisualContext {
    /// Room label, when the scene is recognized.
    pub room: Option<String>,
    /// Objects detected in frame.
    pub objects: Vec<String>,
    /// Number of people detected.
    pub people_count: usize,
    /// Detected gesture label (e.g. "pointing", "wave").
    pub gesture: Option<String>,
    /// Object the user appears to be pointing at.
    pub pointing_target: Option<String>,
    /// Coarse pointing direction (e.g. "left", "up").
    pub pointing_direction: Option<String>,
    /// Free-form hint from the scene analyzer.
    pub context_hint: Option<String>,
}

impl VisualContext {
    /// Whether the frame carries a usable pointing cue.
    pub fn has_pointing(&self) -> bool {
        self.pointing_target.is_some() || self.pointing_direction.is_some()
    }
}

/// Declared speech condition on a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechCondition {
    Dysarthria,
    Aphasia,
    /// Other motor speech disorders (apraxia etc.).
    MotorSpeech,
    Other,
}

/// How the emergency contact should be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    Call,
    Text,
}

/// Emergency contact details on a user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub phone: String,
    pub method: ContactMethod,
}

/// Read-only prior about the speaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Display name, used in emergency notifications.
    pub name: String,
    /// Declared speech conditions.
    pub conditions: Vec<SpeechCondition>,
    /// Example phrases collected during calibration.
    pub calibration_examples: Vec<String>,
    /// Emergency contact, when configured.
    pub emergency_contact: Option<EmergencyContact>,
}

impl UserProfile {
    pub fn declares(&self, condition: SpeechCondition) -> bool {
        self.conditions.contains(&condition)
    }
}

/// One prior exchange in the running conversation, passed to scoring and
/// to the semantic-completion collaborator.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub user_text: String,
    pub assistant_text: String,
}

/// Final product of the interpretation pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Interpretation {
    /// Transcript as heard.
    pub original_text: String,
    /// Resolved meaning.
    pub interpreted_text: String,
    /// Confidence in \[10, 99\], floored at 85 for urgent utterances.
    pub confidence: u8,
    /// Up to three alternative readings, externally ranked.
    pub alternatives: Vec<String>,
    /// Collaborator-assigned category (e.g. "need", "device_control").
    pub category: Option<String>,
    /// Short human-readable account of how the reading was reached.
    pub reasoning: String,
    /// Whether the user must confirm before anything acts on this.
    pub requires_confirmation: bool,
    /// Urgency tier, when detected.
    pub urgency: Option<UrgencyLevel>,
    /// Whether an external action (notification, device) is implied.
    pub action_required: bool,
}
