//! Configuration types for the interpretation engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interpretation thresholds and limits.
    pub interpretation: InterpretationConfig,
    /// Correction-memory tuning.
    pub correction: CorrectionConfig,
    /// Calibration acceptance tuning.
    pub calibration: CalibrationConfig,
    /// Auto-confirm policy for low-stakes confirmable actions.
    pub confirm_policy: ConfirmPolicyConfig,
}

/// Interpretation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpretationConfig {
    /// Confidence below which a non-urgent interpretation requires
    /// explicit confirmation.
    pub confirm_threshold: u8,
    /// Confidence floor applied to urgent interpretations.
    pub urgency_floor: u8,
    /// Maximum alternatives surfaced with a confirmation request.
    pub max_alternatives: usize,
    /// Fixed confidence assigned to correction-memory hits.
    pub correction_hit_confidence: u8,
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 80,
            urgency_floor: 85,
            max_alternatives: 3,
            correction_hit_confidence: 95,
        }
    }
}

/// Correction-memory tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Word-level similarity ratio required for a fuzzy hit.
    ///
    /// Typical range 0.7–0.9: lower values short-circuit more often but
    /// risk replaying the wrong correction.
    pub similarity_threshold: f32,
    /// Bound on remembered corrections (oldest evicted first).
    pub capacity: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            capacity: 256,
        }
    }
}

/// Calibration acceptance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Accuracy percentage required to accept a calibration pass.
    pub accept_percent: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            accept_percent: 75.0,
        }
    }
}

/// What the auto-confirm countdown resolves to when it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoConfirmOutcome {
    Accept,
    Reject,
}

/// Bounded auto-confirm policy.
///
/// This is a UI-level policy layered above the state machine: the
/// unbounded confirm/reject wait becomes bounded only for low-stakes
/// device actions, resolving to `default_outcome` on expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmPolicyConfig {
    /// Whether the countdown applies at all.
    pub auto_confirm: bool,
    /// Countdown length in seconds.
    pub timeout_secs: u64,
    /// Outcome when the countdown expires without user action.
    pub default_outcome: AutoConfirmOutcome,
}

impl Default for ConfirmPolicyConfig {
    fn default() -> Self {
        Self {
            auto_confirm: true,
            timeout_secs: 5,
            default_outcome: AutoConfirmOutcome::Accept,
        }
    }
}

impl EngineConfig {
    /// Default config file location (`<config_dir>/speechbridge/engine.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("speechbridge").join("engine.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
