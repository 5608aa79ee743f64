//! Interpretation pipeline: prompt-style selection and the orchestrator
//! that sequences classification, correction lookup, semantic completion,
//! scoring, and the confirm/reject protocol.

pub mod orchestrator;
pub mod prompts;

pub use orchestrator::{
    InterpretOutcome, InterpretationOrchestrator, PendingInterpretation, REPROMPT,
};
pub use prompts::{PromptStyle, style_for};
