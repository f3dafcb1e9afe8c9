//! Speech Mapper: transcribed words → intervals
//!
//! Transcription arrives late, so an interval `[start, end)` claims every
//! pending word with `start - lookback <= t < end`. Words at or after `end`
//! wait for a later interval; older ones are discarded.

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::types::{SpeechSlice, Word};

/// Running counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct SpeechStats {
    pub total_words_mapped: u64,
    pub total_silence_detected: u64,
    pub stale_words_discarded: u64,
    pub pending_words: usize,
    pub last_word_time: Option<f64>,
}

/// Buffers words and assigns them to intervals
#[derive(Debug)]
pub struct SpeechMapper {
    lookback: f64,
    silence_threshold: f64,
    /// Unordered
    pending: Vec<Word>,
    last_word_time: Option<f64>,
    total_words_mapped: u64,
    total_silence_detected: u64,
    stale_words_discarded: u64,
}

impl Default for SpeechMapper {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl SpeechMapper {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            lookback: config.lookback_secs,
            silence_threshold: config.silence_threshold_secs,
            pending: Vec::new(),
            last_word_time: None,
            total_words_mapped: 0,
            total_silence_detected: 0,
            stale_words_discarded: 0,
        }
    }

    /// Queue one word
    pub fn add_word(&mut self, text: impl Into<String>, timestamp: f64, confidence: f64) {
        self.push(Word::new(text, timestamp, confidence));
    }

    /// Queue a phrase, spreading word times evenly over `[start, end)`
    pub fn add_segment(&mut self, text: &str, start: f64, end: f64, confidence: f64) {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return;
        }

        let per_word = (end - start).max(0.0) / words.len() as f64;
        for (i, word) in words.into_iter().enumerate() {
            let word_start = start + i as f64 * per_word;
            self.push(Word::spanning(word, word_start, word_start + per_word, confidence));
        }
    }

    fn push(&mut self, word: Word) {
        debug!(word = %word.text, t = word.timestamp(), pending = self.pending.len() + 1, "word queued");
        self.last_word_time = Some(word.timestamp());
        self.pending.push(word);
    }

    /// Claim pending words for `[interval_start, interval_end)`
    pub fn map_to_interval(&mut self, interval_start: f64, interval_end: f64) -> SpeechSlice {
        let earliest = interval_start - self.lookback;

        let mut matched = Vec::new();
        let mut retained = Vec::new();
        for word in self.pending.drain(..) {
            let t = word.timestamp();
            if t >= interval_end {
                retained.push(word);
            } else if t >= earliest {
                debug!(word = %word.text, offset = interval_start - t, "word matched");
                matched.push(word);
            } else {
                warn!(word = %word.text, t, earliest, "word too old, discarding");
                self.stale_words_discarded += 1;
            }
        }
        self.pending = retained;

        matched.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
        let is_silence = self.is_silence(&matched);

        self.total_words_mapped += matched.len() as u64;
        if is_silence {
            self.total_silence_detected += 1;
        }

        let full_text = matched
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            start = interval_start,
            end = interval_end,
            words = matched.len(),
            silence = is_silence,
            remaining = self.pending.len(),
            "speech mapped"
        );

        SpeechSlice {
            words: matched,
            full_text,
            is_silence,
        }
    }

    /// No words, or some consecutive gap at/above the threshold
    fn is_silence(&self, sorted: &[Word]) -> bool {
        if sorted.is_empty() {
            return true;
        }
        sorted
            .windows(2)
            .any(|pair| pair[1].timestamp() - pair[0].timestamp() >= self.silence_threshold)
    }

    /// Drop pending words older than `max_age`; returns how many
    pub fn flush_stale(&mut self, now: f64, max_age: f64) -> usize {
        let cutoff = now - max_age;
        let before = self.pending.len();
        self.pending.retain(|w| w.timestamp() >= cutoff);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            warn!(dropped, cutoff, "flushed stale pending words");
            self.stale_words_discarded += dropped as u64;
        }
        dropped
    }

    /// Words waiting for an interval
    pub fn pending_word_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> SpeechStats {
        SpeechStats {
            total_words_mapped: self.total_words_mapped,
            total_silence_detected: self.total_silence_detected,
            stale_words_discarded: self.stale_words_discarded,
            pending_words: self.pending.len(),
            last_word_time: self.last_word_time,
        }
    }

    /// Discard all state for a new session
    pub fn reset_session(&mut self) {
        self.pending.clear();
        self.last_word_time = None;
        self.total_words_mapped = 0;
        self.total_silence_detected = 0;
        self.stale_words_discarded = 0;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookback_window() {
        let mut mapper = SpeechMapper::default();
        mapper.add_word("late", 7.0, 1.0);
        mapper.add_word("stale", 4.0, 1.0);
        mapper.add_word("inside", 10.5, 1.0);
        mapper.add_word("future", 11.0, 1.0);

        let slice = mapper.map_to_interval(10.0, 11.0);
        let texts: Vec<_> = slice.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["late", "inside"]);
        assert_eq!(mapper.pending_word_count(), 1);
        assert_eq!(mapper.stats().stale_words_discarded, 1);
    }

    #[test]
    fn test_words_sorted_before_join() {
        let mut mapper = SpeechMapper::default();
        mapper.add_word("world", 10.4, 1.0);
        mapper.add_word("hello", 10.2, 1.0);

        let slice = mapper.map_to_interval(10.0, 11.0);
        assert_eq!(slice.full_text, "hello world");
    }

    #[test]
    fn test_no_words_is_silence() {
        let mut mapper = SpeechMapper::default();
        let slice = mapper.map_to_interval(0.0, 1.0);
        assert!(slice.is_silence);
        assert!(slice.full_text.is_empty());
        assert_eq!(mapper.stats().total_silence_detected, 1);
    }

    #[test]
    fn test_close_words_not_silence() {
        let mut mapper = SpeechMapper::default();
        mapper.add_word("a", 10.0, 1.0);
        mapper.add_word("b", 10.05, 1.0);
        mapper.add_word("c", 10.1, 1.0);

        let slice = mapper.map_to_interval(10.0, 11.0);
        assert!(!slice.is_silence);
    }

    #[test]
    fn test_inner_gap_is_silence() {
        let mut mapper = SpeechMapper::default();
        mapper.add_word("before", 8.0, 1.0);
        mapper.add_word("after", 10.2, 1.0);

        let slice = mapper.map_to_interval(10.0, 11.0);
        assert_eq!(slice.words.len(), 2);
        assert!(slice.is_silence);
    }

    #[test]
    fn test_segment_distribution() {
        let mut mapper = SpeechMapper::default();
        mapper.add_segment("one two three four", 20.0, 22.0, 0.9);
        assert_eq!(mapper.pending_word_count(), 4);

        let slice = mapper.map_to_interval(21.0, 22.0);
        let times: Vec<_> = slice.words.iter().map(|w| w.timestamp()).collect();
        assert_eq!(times, vec![20.0, 20.5, 21.0, 21.5]);
        assert_eq!(slice.words[0].end_timestamp, 20.5);
        assert!((slice.avg_confidence() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_empty_segment_ignored() {
        let mut mapper = SpeechMapper::default();
        mapper.add_segment("   ", 0.0, 1.0, 1.0);
        assert_eq!(mapper.pending_word_count(), 0);
        assert_eq!(mapper.stats().last_word_time, None);
    }

    #[test]
    fn test_flush_stale() {
        let mut mapper = SpeechMapper::default();
        mapper.add_word("old", 1.0, 1.0);
        mapper.add_word("recent", 15.0, 1.0);

        let dropped = mapper.flush_stale(20.0, 10.0);
        assert_eq!(dropped, 1);
        assert_eq!(mapper.pending_word_count(), 1);
    }

    #[test]
    fn test_reset_session() {
        let mut mapper = SpeechMapper::default();
        mapper.add_word("x", 1.0, 1.0);
        mapper.map_to_interval(1.0, 2.0);
        mapper.add_word("y", 3.0, 1.0);

        mapper.reset_session();
        assert_eq!(mapper.stats(), SpeechStats::default());
    }
}
