//! Timestamped words and per-track transcripts.

use serde::{Deserialize, Serialize};

/// One recognized word with its time span in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Word {
    /// Create a word, clamping `end_ms` so it never precedes `start_ms`.
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms: end_ms.max(start_ms),
        }
    }

    /// Shift the word by a segment offset.
    pub fn offset(self, offset_ms: u64) -> Self {
        Self {
            start_ms: self.start_ms + offset_ms,
            end_ms: self.end_ms + offset_ms,
            ..self
        }
    }
}

/// Time-ordered words recognized on one track.
///
/// An empty transcript marks the track as unusable for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub words: Vec<Word>,
}

impl Transcript {
    /// Build a transcript from words in any order.
    pub fn from_words(mut words: Vec<Word>) -> Self {
        words.sort_by_key(|w| (w.start_ms, w.end_ms));
        Self { words }
    }

    /// Concatenate per-segment results and sort them by time.
    pub fn assemble(parts: impl IntoIterator<Item = Vec<Word>>) -> Self {
        Self::from_words(parts.into_iter().flatten().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Plain text of all words in time order.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn duration_ms(&self) -> u64 {
        self.words.iter().map(|w| w.end_ms).max().unwrap_or(0)
    }
}
