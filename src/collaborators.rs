//! Contracts for external collaborators.
//!
//! The engine never owns transport or wire formats: each collaborator is
//! an async trait taking and returning plain structured values. Hosts
//! wire in real implementations (HTTP, local models, telephony); tests
//! wire in mocks. Every collaborator may fail or time out — callers
//! degrade per the session's failure policy rather than aborting.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::intent::ActionType;
use crate::interpret::prompts::PromptStyle;
use crate::types::{ConversationTurn, UserProfile, VisualContext};

/// A transcript event from the speech-to-text collaborator.
///
/// The engine consumes only events with `is_final == true`; partial
/// hypotheses are the calibration aligner's concern alone.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// Request to the semantic-completion collaborator.
#[derive(Debug, Clone)]
pub struct InterpretRequest {
    /// Normalized utterance text.
    pub text: String,
    /// Read-only speaker prior.
    pub profile: UserProfile,
    /// Scene context for this utterance, when vision is enabled.
    pub visual: Option<VisualContext>,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ConversationTurn>,
    /// Instruction template the collaborator should apply.
    pub style: PromptStyle,
}

/// Response from the semantic-completion collaborator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterpreterResponse {
    /// Most likely intended meaning.
    pub interpretation: String,
    /// Self-reported confidence (0–100), when provided.
    pub confidence: Option<u8>,
    /// Ranked alternative readings.
    pub alternatives: Vec<String>,
    /// Category label (e.g. "need", "device_control", "social").
    pub category: Option<String>,
    /// Device action the collaborator believes is implied, if any.
    pub action: Option<String>,
    /// Suggested spoken reply.
    pub response: String,
    /// Short account of the reading.
    pub reasoning: String,
}

impl InterpreterResponse {
    /// Parse a collaborator reply that should be JSON but may arrive
    /// wrapped in a markdown code fence.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Interpreter`] when the payload is not valid
    /// JSON for this shape.
    pub fn from_json(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed);
        serde_json::from_str(body.trim())
            .map_err(|e| EngineError::Interpreter(format!("malformed response: {e}")))
    }
}

/// Semantic completion of ambiguous or fragmented utterances.
#[async_trait]
pub trait SemanticInterpreter: Send + Sync {
    async fn interpret(&self, request: InterpretRequest) -> Result<InterpreterResponse>;
}

/// Synthesized audio returned by a synthesis collaborator.
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Stable identifier for logging (e.g. `cloud`, `local`).
    fn id(&self) -> &'static str;

    async fn speak(&self, text: &str) -> Result<SynthesizedSpeech>;
}

/// Scene analysis of a camera frame.
#[async_trait]
pub trait SceneAnalyzer: Send + Sync {
    /// Returns `None` when the frame yields no usable context.
    async fn analyze_frame(&self, frame: &[u8]) -> Result<Option<VisualContext>>;
}

/// Outcome of a device-control execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
}

/// Smart-home device execution.
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn execute(
        &self,
        action: ActionType,
        room: Option<&str>,
        device_id: Option<&str>,
    ) -> Result<ExecutionOutcome>;
}

/// Outcome of an emergency notification attempt.
#[derive(Debug, Clone)]
pub struct NotifyOutcome {
    pub success: bool,
    pub call_id: Option<String>,
}

/// Emergency-notification dispatch (phone call or text).
#[async_trait]
pub trait EmergencyNotifier: Send + Sync {
    async fn notify(&self, phone: &str, message: &str, user_name: &str) -> Result<NotifyOutcome>;
}
