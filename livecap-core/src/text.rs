//! Incremental transcript reconciliation.
//!
//! Successive windows share their overlap region, so successive transcripts
//! mostly repeat each other. [`unique_suffix`] extracts only the words that
//! are new in the latest transcript, and [`TranscriptState`] keeps the
//! baseline it is computed against, clearing it after long silences.

use std::time::{Duration, Instant};

/// Newly appeared suffix of `current` relative to `previous`.
///
/// Both strings are tokenized into words and compared case-insensitively.
/// The longest `k` such that `previous` ends with the same `k` words
/// `current` begins with is treated as already shown; the words of
/// `current` after position `k` are returned joined by single spaces. Ties
/// always resolve to the largest `k`.
///
/// An empty `previous` makes all of `current` new. When no overlap of any
/// length exists, `current` is returned unchanged: a window that matches
/// nothing is treated as entirely new text, repeats and all.
pub fn unique_suffix(previous: &str, current: &str) -> String {
    if previous.is_empty() {
        return current.to_string();
    }

    let prev_words: Vec<String> = previous.split_whitespace().map(str::to_lowercase).collect();
    let cur_words: Vec<&str> = current.split_whitespace().collect();
    let cur_lower: Vec<String> = cur_words.iter().map(|w| w.to_lowercase()).collect();

    let max_overlap = prev_words.len().min(cur_words.len());
    for k in (1..=max_overlap).rev() {
        if prev_words[prev_words.len() - k..] == cur_lower[..k] {
            return cur_words[k..].join(" ");
        }
    }
    current.to_string()
}

/// Rolling baseline for suffix reconciliation.
///
/// Tracks the last full transcript that produced output and the instant of
/// the last emission or reset. Once the gap since then exceeds the
/// configured interval the baseline clears, so speech after a long silence
/// is never suffix-matched against stale text.
#[derive(Debug)]
pub struct TranscriptState {
    last_full_text: String,
    last_emit: Instant,
    newline_interval: Duration,
}

impl TranscriptState {
    pub fn new(newline_interval: Duration) -> Self {
        Self {
            last_full_text: String::new(),
            last_emit: Instant::now(),
            newline_interval,
        }
    }

    /// The transcript new windows reconcile against.
    pub fn last_full_text(&self) -> &str {
        &self.last_full_text
    }

    /// Record that `full_text`'s suffix was just emitted.
    pub fn commit(&mut self, full_text: String) {
        self.commit_at(full_text, Instant::now());
    }

    /// Clear the baseline when the idle gap exceeded the interval.
    /// Returns whether a reset happened.
    pub fn maybe_reset(&mut self) -> bool {
        self.maybe_reset_at(Instant::now())
    }

    fn commit_at(&mut self, full_text: String, now: Instant) {
        self.last_full_text = full_text;
        self.last_emit = now;
    }

    fn maybe_reset_at(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_emit) > self.newline_interval {
            self.last_full_text.clear();
            self.last_emit = now;
            true
        } else {
            false
        }
    }
}
