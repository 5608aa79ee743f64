//! Per-utterance interpretation sequencing.
//!
//! Order matters and is load-bearing:
//!
//! 1. Urgency short-circuit — no confirmation, immediate emergency
//!    notification when the contact method is call-based.
//! 2. Correction-memory lookup — a fuzzy hit replays the stored
//!    correction at fixed confidence and skips the interpreter entirely.
//! 3. Semantic completion via the external collaborator, with the
//!    instruction style selected by pattern type.
//! 4. Confidence scoring (skeptical cap / urgent floor).
//! 5. Confirm/reject protocol for low-confidence or fragmented input.
//!
//! The orchestrator itself is stateless between utterances; the session
//! guarantees at most one orchestration is in flight at a time and the
//! correction store is written only here, on explicit confirmation.

use std::sync::Arc;

use tracing::{info, warn};

use crate::collaborators::{EmergencyNotifier, InterpretRequest, SemanticInterpreter};
use crate::confidence::{self, ScoreInputs};
use crate::config::InterpretationConfig;
use crate::correction::CorrectionStore;
use crate::error::{EngineError, Result};
use crate::interpret::prompts;
use crate::normalize;
use crate::pattern;
use crate::types::{
    ContactMethod, ConversationTurn, Interpretation, SpeechPattern, UrgencyLevel, UserProfile,
    Utterance, VisualContext,
};

/// Generic re-prompt spoken after a rejected interpretation.
pub const REPROMPT: &str = "Sorry, I didn't get that. Could you try again?";

/// An interpretation awaiting explicit user confirmation.
///
/// Holds everything needed to finalize: the orchestrator writes
/// correction memory only when [`InterpretationOrchestrator::confirm`]
/// is called with this value. Dropping it (rejection, supersession,
/// session stop) has zero side effects.
#[derive(Debug, Clone)]
pub struct PendingInterpretation {
    pub interpretation: Interpretation,
}

/// Result of one orchestration.
#[derive(Debug, Clone)]
pub enum InterpretOutcome {
    /// Urgency detected: confirmation bypassed, notification attempted.
    Urgent {
        interpretation: Interpretation,
        /// Whether the emergency notification went out.
        notified: bool,
        /// CRITICAL urgency whose notification failed: the one case that
        /// must surface a loud, non-dismissible alert.
        escalation_failed: bool,
    },
    /// Confident, non-fragmented: no confirmation required.
    Resolved(Interpretation),
    /// Low confidence or fragmented: wait for confirm/reject.
    NeedsConfirmation(PendingInterpretation),
}

/// Sequences the interpretation pipeline for one utterance at a time.
pub struct InterpretationOrchestrator {
    interpreter: Arc<dyn SemanticInterpreter>,
    corrections: Arc<dyn CorrectionStore>,
    notifier: Arc<dyn EmergencyNotifier>,
    config: InterpretationConfig,
}

impl InterpretationOrchestrator {
    pub fn new(
        interpreter: Arc<dyn SemanticInterpreter>,
        corrections: Arc<dyn CorrectionStore>,
        notifier: Arc<dyn EmergencyNotifier>,
        config: InterpretationConfig,
    ) -> Self {
        Self {
            interpreter,
            corrections,
            notifier,
            config,
        }
    }

    /// Run the full pipeline for one utterance.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyInput`] for blank transcripts. All
    /// collaborator failures are absorbed into degraded outcomes.
    pub async fn run(
        &self,
        utterance: &Utterance,
        profile: &UserProfile,
        visual: Option<&VisualContext>,
        history: &[ConversationTurn],
    ) -> Result<InterpretOutcome> {
        let raw = utterance.text.trim();
        if raw.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let normalized = normalize::normalize_detailed(raw);
        let speech = pattern::classify(raw, &normalized, profile);

        // Emergency tiers short-circuit everything, confirmation included.
        // Important-tier urgency stays on the normal path (it is surfaced
        // with priority but still confirmed like any other utterance).
        if let Some(level) = speech.urgency
            && level.is_emergency()
        {
            return Ok(self
                .handle_urgent(raw, &normalized.text, &speech, level, profile)
                .await);
        }

        // Learned correction: replay a previously confirmed reading.
        if let Some(hit) = self.corrections.lookup(raw)? {
            info!(original = raw, corrected = hit.corrected.as_str(), "correction memory hit");
            return Ok(InterpretOutcome::Resolved(Interpretation {
                original_text: raw.to_owned(),
                interpreted_text: hit.corrected,
                confidence: self.config.correction_hit_confidence,
                alternatives: Vec::new(),
                category: Some("learned".to_owned()),
                reasoning: "matched a previously confirmed correction".to_owned(),
                requires_confirmation: false,
                urgency: speech.urgency,
                action_required: false,
            }));
        }

        // External semantic completion.
        let request = InterpretRequest {
            text: normalized.text.clone(),
            profile: profile.clone(),
            visual: visual.cloned(),
            history: history.to_vec(),
            style: prompts::style_for(speech.pattern),
        };
        let response = match self.interpreter.interpret(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "interpreter failed, falling back to raw utterance");
                return Ok(InterpretOutcome::NeedsConfirmation(PendingInterpretation {
                    interpretation: Interpretation {
                        original_text: raw.to_owned(),
                        interpreted_text: raw.to_owned(),
                        confidence: 50,
                        alternatives: Vec::new(),
                        category: None,
                        reasoning: "interpreter unavailable, using raw transcript".to_owned(),
                        requires_confirmation: true,
                        urgency: speech.urgency,
                        action_required: false,
                    },
                }));
            }
        };

        let interpreted = if response.interpretation.trim().is_empty() {
            raw.to_owned()
        } else {
            response.interpretation.clone()
        };

        let overlap = visual
            .map(|ctx| confidence::visual_overlap(&ctx.objects, &interpreted))
            .unwrap_or(false);
        let score = confidence::score(&ScoreInputs {
            pattern: &speech,
            external_confidence: response.confidence,
            visual_overlap: overlap,
            history_len: history.len(),
            interpreted_word_count: interpreted.split_whitespace().count(),
        });

        let requires_confirmation =
            score < self.config.confirm_threshold || speech.is_fragmented;

        let mut alternatives = response.alternatives;
        alternatives.truncate(self.config.max_alternatives);

        let interpretation = Interpretation {
            original_text: raw.to_owned(),
            interpreted_text: interpreted,
            confidence: score,
            alternatives,
            category: response.category,
            reasoning: response.reasoning,
            requires_confirmation,
            urgency: speech.urgency,
            action_required: response.action.is_some(),
        };

        if requires_confirmation {
            Ok(InterpretOutcome::NeedsConfirmation(PendingInterpretation {
                interpretation,
            }))
        } else {
            Ok(InterpretOutcome::Resolved(interpretation))
        }
    }

    /// Urgency short-circuit: emit immediately, notify when call-based.
    async fn handle_urgent(
        &self,
        raw: &str,
        normalized: &str,
        speech: &SpeechPattern,
        level: UrgencyLevel,
        profile: &UserProfile,
    ) -> InterpretOutcome {
        let score = confidence::score(&ScoreInputs {
            pattern: speech,
            external_confidence: None,
            visual_overlap: false,
            history_len: 0,
            interpreted_word_count: speech.word_count,
        });

        let interpretation = Interpretation {
            original_text: raw.to_owned(),
            interpreted_text: normalized.to_owned(),
            confidence: score.max(self.config.urgency_floor),
            alternatives: Vec::new(),
            category: Some("emergency".to_owned()),
            reasoning: format!("{level:?} urgency keywords detected"),
            requires_confirmation: false,
            urgency: Some(level),
            action_required: true,
        };

        let call_contact = profile
            .emergency_contact
            .as_ref()
            .filter(|c| c.method == ContactMethod::Call);

        let (notified, escalation_failed) = match call_contact {
            Some(contact) => {
                let message = format!(
                    "{} may need help. They said: \"{}\"",
                    display_name(profile),
                    raw
                );
                match self
                    .notifier
                    .notify(&contact.phone, &message, &display_name(profile))
                    .await
                {
                    Ok(outcome) if outcome.success => (true, false),
                    Ok(_) | Err(_) => {
                        warn!(urgency = ?level, "emergency notification failed");
                        (false, level == UrgencyLevel::Critical)
                    }
                }
            }
            None => (false, false),
        };

        InterpretOutcome::Urgent {
            interpretation,
            notified,
            escalation_failed,
        }
    }

    /// User confirmed a pending interpretation: record it and finalize.
    ///
    /// This is the only write path into correction memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the correction store rejects the write.
    pub fn confirm(&self, pending: PendingInterpretation) -> Result<Interpretation> {
        let mut interpretation = pending.interpretation;
        self.corrections.record(
            &interpretation.original_text,
            &interpretation.interpreted_text,
        )?;
        interpretation.requires_confirmation = false;
        info!(
            original = interpretation.original_text.as_str(),
            interpreted = interpretation.interpreted_text.as_str(),
            "interpretation confirmed"
        );
        Ok(interpretation)
    }

    /// User rejected a pending interpretation: discard it, no memory
    /// write, return the generic re-prompt.
    pub fn reject(&self, pending: PendingInterpretation) -> &'static str {
        info!(
            original = pending.interpretation.original_text.as_str(),
            "interpretation rejected"
        );
        REPROMPT
    }
}

fn display_name(profile: &UserProfile) -> String {
    if profile.name.trim().is_empty() {
        "The user".to_owned()
    } else {
        profile.name.clone()
    }
}
