//! Interval model
//!
//! - Interval = one fixed-duration window of samples and speech
//! - Intervals are contiguous and strictly increasing within a session
//! - Speech is merged once, before the interval is emitted

use serde::{Deserialize, Serialize};

use crate::types::{EngagementState, Trend, Word};

/// One ranked fine-grained category within an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCategory {
    pub name: String,
    /// Mean score over detected samples
    pub avg_score: f64,
    /// Versus the same name in the previous emitted interval
    pub trend: Trend,
}

/// Boolean markers attached to every interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalFlags {
    /// At least 80% of samples had a detection
    pub high_confidence: bool,
    /// Some top category trended up or down
    pub emotion_shift: bool,
    /// Dominant state differs from the previous interval
    pub state_transition: bool,
    /// No words, or an inner gap at/above the silence threshold
    pub silence: bool,
}

/// Words attributed to one interval by the speech mapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechSlice {
    /// Sorted by timestamp
    pub words: Vec<Word>,
    pub full_text: String,
    pub is_silence: bool,
}

impl SpeechSlice {
    /// Mean recognition confidence, 0.0 when empty
    pub fn avg_confidence(&self) -> f64 {
        if self.words.is_empty() {
            return 0.0;
        }
        self.words.iter().map(|w| w.confidence).sum::<f64>() / self.words.len() as f64
    }
}

/// A closed aggregation window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Ordinal within the session (0-based)
    pub sequence: u64,
    pub interval_start: f64,
    pub interval_end: f64,
    /// Ranked, at most top-N
    pub top_categories: Vec<TopCategory>,
    pub dominant_state: EngagementState,
    pub frame_count: usize,
    pub detected_count: usize,
    pub words: Vec<Word>,
    pub full_text: String,
    /// Mean word confidence
    pub speech_confidence: f64,
    pub flags: IntervalFlags,
}

impl Interval {
    /// Window midpoint
    pub fn timestamp(&self) -> f64 {
        self.interval_start + self.duration() / 2.0
    }

    pub fn duration(&self) -> f64 {
        self.interval_end - self.interval_start
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Merge speech into the interval, consuming it
    pub fn with_speech(mut self, speech: SpeechSlice) -> Self {
        self.speech_confidence = speech.avg_confidence();
        self.flags.silence = speech.is_silence;
        self.words = speech.words;
        self.full_text = speech.full_text;
        self
    }

    /// "10.0-11.0s"
    pub fn label(&self) -> String {
        format!("{:.1}-{:.1}s", self.interval_start, self.interval_end)
    }
}
