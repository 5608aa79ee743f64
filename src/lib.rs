//! Speechbridge: speech interpretation and intent resolution for users
//! with speech disabilities.
//!
//! The engine turns disordered, fragmented, or unclear finalized
//! transcripts into confident interpretations and discrete actions:
//!
//! Transcript → Normalize → Classify → {Emergency | Direct action |
//! Semantic completion} → Confidence → Confirm/Reject → Respond
//!
//! # Architecture
//!
//! The pipeline is built from small, independently testable stages:
//! - **Normalization**: Collapses stutter artifacts and word repeats
//! - **Pattern classification**: Urgency tiers and disorder patterns
//! - **Intent matching**: Vision-fused and keyword device actions
//! - **Orchestration**: Correction memory, semantic completion, scoring,
//!   and the confirm/reject protocol
//! - **Session**: The per-utterance state machine, with single-slot
//!   cancel-and-supersede supervision
//!
//! External collaborators (speech-to-text, semantic completion,
//! synthesis, vision, device control, emergency notification) are async
//! traits in [`collaborators`]; the engine owns no transport.

pub mod calibration;
pub mod collaborators;
pub mod confidence;
pub mod config;
pub mod correction;
pub mod devices;
pub mod error;
pub mod intent;
pub mod interpret;
pub mod normalize;
pub mod pattern;
pub mod session;
pub mod synthesis;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use interpret::{InterpretOutcome, InterpretationOrchestrator, PendingInterpretation};
pub use session::{ConversationSessionController, SessionEvent, SessionHandle, SessionState};
pub use types::{Interpretation, UrgencyLevel, UserProfile, Utterance};

/// Initialize tracing for host binaries — suppress noisy dependency logs
/// by default. Users can override with RUST_LOG=debug to see everything.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("speechbridge=info")),
        )
        .init();
}
