//! Live word-level alignment for calibration passages.
//!
//! During calibration the user reads a fixed reference passage aloud and
//! the recognizer streams partial transcripts, potentially many per
//! second. Alignment is a full recompute on every update — O(target
//! length), idempotent, so updates may be coalesced or dropped under load
//! with no correctness loss (passages stay under ~150 words).
//!
//! The algorithm keeps one forward cursor into the target sequence and
//! tolerates up to two skipped target words per spoken word. Known
//! limitation, kept deliberately: nearby duplicate words in the target
//! passage can satisfy the two-word lookahead early and misattribute a
//! skip. See `nearby_duplicate_triggers_false_skip` below for the shape
//! of the behavior.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};

use crate::collaborators::TranscriptEvent;

/// Accuracy required to accept a calibration pass.
pub const ACCEPT_THRESHOLD_PERCENT: f64 = 75.0;

/// Per-target-word alignment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    /// Not yet reached by the cursor.
    Pending,
    /// Spoken correctly (directly or via lookahead).
    Correct,
    /// Skipped or failed attempt.
    Incorrect,
}

/// One calibration attempt for a single passage.
///
/// Created per phrase and discarded on re-record; a finished session is
/// persisted externally only when [`CalibrationSession::is_accepted`].
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    target_words: Vec<String>,
    spoken_words: Vec<String>,
    statuses: Vec<WordStatus>,
    started_at: DateTime<Utc>,
}

impl CalibrationSession {
    /// Start a session for a reference passage. The passage is
    /// punctuation-stripped and lowercased for matching.
    pub fn new(passage: &str) -> Self {
        let target_words: Vec<String> = passage
            .split_whitespace()
            .map(clean_word)
            .filter(|w| !w.is_empty())
            .collect();
        let statuses = vec![WordStatus::Pending; target_words.len()];
        Self {
            target_words,
            spoken_words: Vec::new(),
            statuses,
            started_at: Utc::now(),
        }
    }

    /// Replace the spoken transcript with the latest recognizer output
    /// and realign from scratch.
    pub fn update(&mut self, transcript: &str) {
        self.spoken_words = transcript
            .split_whitespace()
            .map(clean_word)
            .filter(|w| !w.is_empty())
            .collect();
        self.statuses = align(&self.target_words, &self.spoken_words);
    }

    /// Re-record: discard spoken history and reset every word to pending.
    pub fn restart(&mut self) {
        self.spoken_words.clear();
        self.statuses = vec![WordStatus::Pending; self.target_words.len()];
        self.started_at = Utc::now();
    }

    /// Per-target-word statuses in passage order.
    pub fn statuses(&self) -> &[WordStatus] {
        &self.statuses
    }

    /// Target words after cleaning.
    pub fn target_words(&self) -> &[String] {
        &self.target_words
    }

    /// Percentage of target words spoken correctly.
    pub fn accuracy_percent(&self) -> f64 {
        if self.target_words.is_empty() {
            return 0.0;
        }
        let correct = self
            .statuses
            .iter()
            .filter(|s| **s == WordStatus::Correct)
            .count();
        correct as f64 / self.target_words.len() as f64 * 100.0
    }

    /// Whether this pass meets the acceptance threshold (≥ 75%).
    pub fn is_accepted(&self) -> bool {
        self.accuracy_percent() >= ACCEPT_THRESHOLD_PERCENT
    }

    /// Elapsed time since the session (or latest re-record) began.
    pub fn duration_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Drive the session from a stream of recognizer transcripts,
    /// realigning on every partial and stopping at the final event.
    pub async fn consume<S>(&mut self, mut transcripts: S)
    where
        S: Stream<Item = TranscriptEvent> + Unpin,
    {
        while let Some(event) = transcripts.next().await {
            self.update(&event.text);
            if event.is_final {
                break;
            }
        }
    }
}

/// Greedy forward alignment with one- and two-word lookahead.
fn align(target: &[String], spoken: &[String]) -> Vec<WordStatus> {
    let mut statuses = vec![WordStatus::Pending; target.len()];
    let mut cursor = 0usize;

    for word in spoken {
        if cursor >= target.len() {
            break;
        }
        if *word == target[cursor] {
            statuses[cursor] = WordStatus::Correct;
            cursor += 1;
        } else if cursor + 1 < target.len() && *word == target[cursor + 1] {
            // One target word skipped.
            statuses[cursor] = WordStatus::Incorrect;
            statuses[cursor + 1] = WordStatus::Correct;
            cursor += 2;
        } else if cursor + 2 < target.len() && *word == target[cursor + 2] {
            // Two target words skipped.
            statuses[cursor] = WordStatus::Incorrect;
            statuses[cursor + 1] = WordStatus::Incorrect;
            statuses[cursor + 2] = WordStatus::Correct;
            cursor += 3;
        } else {
            // Failed attempt at the current word.
            statuses[cursor] = WordStatus::Incorrect;
            cursor += 1;
        }
    }

    statuses
}

fn clean_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '\'')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn session(passage: &str, transcript: &str) -> CalibrationSession {
        let mut s = CalibrationSession::new(passage);
        s.update(transcript);
        s
    }

    #[test]
    fn perfect_read_is_all_correct() {
        let s = session("I want coffee", "I want coffee");
        assert_eq!(
            s.statuses(),
            &[WordStatus::Correct, WordStatus::Correct, WordStatus::Correct]
        );
        assert_eq!(s.accuracy_percent(), 100.0);
        assert!(s.is_accepted());
    }

    #[test]
    fn skipped_word_recovered_by_lookahead() {
        let s = session("I want coffee", "I coffee");
        assert_eq!(
            s.statuses(),
            &[WordStatus::Correct, WordStatus::Incorrect, WordStatus::Correct]
        );
        let expected = 2.0 / 3.0 * 100.0;
        assert!((s.accuracy_percent() - expected).abs() < 1e-9);
    }

    #[test]
    fn two_word_skip_recovered() {
        let s = session("please turn on the light", "please the light");
        assert_eq!(
            s.statuses(),
            &[
                WordStatus::Correct,
                WordStatus::Incorrect,
                WordStatus::Incorrect,
                WordStatus::Correct,
                WordStatus::Correct,
            ]
        );
    }

    #[test]
    fn wrong_word_marks_failed_attempt() {
        let s = session("I want coffee", "I need tea");
        assert_eq!(
            s.statuses(),
            &[WordStatus::Correct, WordStatus::Incorrect, WordStatus::Incorrect]
        );
    }

    #[test]
    fn punctuation_and_case_ignored() {
        let s = session("Hello, world!", "hello WORLD");
        assert_eq!(s.accuracy_percent(), 100.0);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut s = CalibrationSession::new("I want coffee now");
        s.update("I want");
        let mid = s.statuses().to_vec();
        s.update("I want");
        assert_eq!(s.statuses(), mid.as_slice());
        s.update("I want coffee now");
        assert_eq!(s.accuracy_percent(), 100.0);
    }

    #[test]
    fn accepted_at_exactly_75() {
        let s = session("one two three four", "one two three");
        assert_eq!(s.accuracy_percent(), 75.0);
        assert!(s.is_accepted());
    }

    #[test]
    fn rejected_at_74() {
        let passage: Vec<String> = (0..50).map(|i| format!("word{i}")).collect();
        let spoken: Vec<String> = passage[..37].to_vec();
        let s = session(&passage.join(" "), &spoken.join(" "));
        assert_eq!(s.accuracy_percent(), 74.0);
        assert!(!s.is_accepted());
    }

    #[test]
    fn restart_clears_history() {
        let mut s = session("I want coffee", "I want coffee");
        assert!(s.is_accepted());
        s.restart();
        assert_eq!(
            s.statuses(),
            &[WordStatus::Pending, WordStatus::Pending, WordStatus::Pending]
        );
        assert_eq!(s.accuracy_percent(), 0.0);
    }

    #[test]
    fn trailing_target_words_stay_pending() {
        let s = session("one two three four", "one");
        assert_eq!(
            s.statuses(),
            &[
                WordStatus::Correct,
                WordStatus::Pending,
                WordStatus::Pending,
                WordStatus::Pending,
            ]
        );
    }

    #[tokio::test]
    async fn stream_of_partials_converges_on_final() {
        let mut s = CalibrationSession::new("I want coffee");
        let events = tokio_stream::iter(vec![
            TranscriptEvent {
                text: "I".into(),
                is_final: false,
            },
            TranscriptEvent {
                text: "I want".into(),
                is_final: false,
            },
            TranscriptEvent {
                text: "I want coffee".into(),
                is_final: true,
            },
        ]);
        s.consume(events).await;
        assert_eq!(s.accuracy_percent(), 100.0);
        assert!(s.is_accepted());
    }

    #[test]
    fn nearby_duplicate_triggers_false_skip() {
        // Documented limitation: a repeated spoken word can satisfy the
        // lookahead when the target repeats the same word nearby. The
        // second "on" below jumps the cursor past "and" instead of being
        // treated as a stutter. Preserved behavior, not a bug to fix.
        let s = session("on and on we go", "on on");
        assert_eq!(
            s.statuses(),
            &[
                WordStatus::Correct,
                WordStatus::Incorrect,
                WordStatus::Correct,
                WordStatus::Pending,
                WordStatus::Pending,
            ]
        );
    }
}
