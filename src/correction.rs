//! Learned correction memory.
//!
//! Stores user-confirmed interpretations keyed by fuzzy similarity to the
//! original transcript, so a later near-identical utterance short-circuits
//! the external interpreter. Writes happen only on explicit confirmation,
//! and only the orchestrator writes — the store still guards itself with a
//! mutex so the single-writer invariant is enforced rather than assumed.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use similar::{Algorithm, capture_diff_slices, get_diff_ratio};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Default fuzzy-match threshold (word-level diff ratio).
pub const DEFAULT_SIMILARITY: f32 = 0.8;

/// Default bound on remembered corrections.
pub const DEFAULT_CAPACITY: usize = 256;

/// A confirmed correction held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCorrection {
    /// Transcript as originally heard.
    pub original: String,
    /// Interpretation the user confirmed.
    pub corrected: String,
    /// When the user confirmed it.
    pub confirmed_at: DateTime<Utc>,
}

/// Injected repository contract for correction memory.
///
/// Hosts may back this with real persistence; the engine ships an
/// in-memory implementation.
pub trait CorrectionStore: Send + Sync {
    /// Find the closest stored correction for `text`, if any entry meets
    /// the similarity threshold.
    fn lookup(&self, text: &str) -> Result<Option<StoredCorrection>>;

    /// Record a confirmed correction.
    fn record(&self, original: &str, corrected: &str) -> Result<()>;
}

/// Bounded in-memory correction store.
///
/// Eviction is oldest-out once capacity is reached.
pub struct MemoryCorrectionStore {
    entries: Mutex<VecDeque<StoredCorrection>>,
    capacity: usize,
    similarity_threshold: f32,
}

impl MemoryCorrectionStore {
    pub fn new(capacity: usize, similarity_threshold: f32) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            similarity_threshold,
        }
    }

    /// Number of stored corrections.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCorrectionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_SIMILARITY)
    }
}

impl CorrectionStore for MemoryCorrectionStore {
    fn lookup(&self, text: &str) -> Result<Option<StoredCorrection>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let entries = self
            .entries
            .lock()
            .map_err(|_| EngineError::Memory("correction store poisoned".into()))?;

        let mut best: Option<(f32, &StoredCorrection)> = None;
        for entry in entries.iter() {
            let ratio = similarity(&needle, &entry.original.to_lowercase());
            if ratio >= self.similarity_threshold
                && best.is_none_or(|(best_ratio, _)| ratio > best_ratio)
            {
                best = Some((ratio, entry));
            }
        }

        if let Some((ratio, entry)) = best {
            debug!(ratio, original = entry.original.as_str(), "correction memory hit");
        }
        Ok(best.map(|(_, entry)| entry.clone()))
    }

    fn record(&self, original: &str, corrected: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| EngineError::Memory("correction store poisoned".into()))?;

        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(StoredCorrection {
            original: original.trim().to_owned(),
            corrected: corrected.trim().to_owned(),
            confirmed_at: Utc::now(),
        });
        Ok(())
    }
}

/// Word-level similarity ratio between two lowercased strings.
fn similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let a_words: Vec<&str> = a.split_whitespace().collect();
    let b_words: Vec<&str> = b.split_whitespace().collect();
    let ops = capture_diff_slices(Algorithm::Myers, &a_words, &b_words);
    get_diff_ratio(&ops, a_words.len(), b_words.len())
}
