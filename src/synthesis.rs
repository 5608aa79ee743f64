//! Primary/fallback routing for speech synthesis.
//!
//! A synthesis failure must never surface as a user-facing error: the
//! router tries the primary collaborator, logs any failure, and falls
//! back to the secondary silently. Only when every synthesizer fails
//! does the caller see an error (and even then the session absorbs it).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::collaborators::{SpeechSynthesizer, SynthesizedSpeech};
use crate::error::{EngineError, Result};

/// Ordered synthesis chain: primary first, then fallbacks.
pub struct SynthesisRouter {
    chain: Vec<Arc<dyn SpeechSynthesizer>>,
}

impl SynthesisRouter {
    /// Build a router from an ordered list of synthesizers.
    pub fn new(chain: Vec<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { chain }
    }

    /// Primary plus one local fallback, the common configuration.
    pub fn with_fallback(
        primary: Arc<dyn SpeechSynthesizer>,
        fallback: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self::new(vec![primary, fallback])
    }

    /// Synthesize `text`, falling through the chain on failure.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Synthesis`] only when every synthesizer in
    /// the chain fails.
    pub async fn speak(&self, text: &str) -> Result<SynthesizedSpeech> {
        let mut last_error: Option<EngineError> = None;

        for synth in &self.chain {
            match synth.speak(text).await {
                Ok(audio) => {
                    debug!(synthesizer = synth.id(), "synthesis succeeded");
                    return Ok(audio);
                }
                Err(err) => {
                    warn!(
                        synthesizer = synth.id(),
                        error = %err,
                        "synthesis failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EngineError::Synthesis("no synthesizers configured".into())))
    }
}
