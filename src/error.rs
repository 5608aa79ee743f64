//! Error types for the interpretation engine.

/// Top-level error type for the speech interpretation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Empty or unintelligible transcript. Callers treat this as a no-op.
    #[error("empty input")]
    EmptyInput,

    /// Semantic-completion collaborator error.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// Speech synthesis collaborator error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Vision collaborator error.
    #[error("vision error: {0}")]
    Vision(String),

    /// Device-control collaborator error.
    #[error("device error: {0}")]
    Device(String),

    /// Emergency-notification collaborator error.
    #[error("notification error: {0}")]
    Notification(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Correction-memory storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Session state machine error.
    #[error("session error: {0}")]
    Session(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

impl EngineError {
    /// Whether this error came from an external collaborator.
    ///
    /// Collaborator failures degrade gracefully and never abort the
    /// session; everything else indicates a local bug or bad input.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Interpreter(_)
                | Self::Synthesis(_)
                | Self::Vision(_)
                | Self::Device(_)
                | Self::Notification(_)
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
