//! Context types handed to the advice generator
//!
//! A Context is a read-only snapshot of the rolling buffer:
//! - time window bounds and per-interval compact summaries
//! - aggregate summary with per-category trends across the buffer
//! - detected patterns (transitions, shifts, silence runs, engagement)
//! - aggregated flags as ratios

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{EngagementState, Trend};

/// Summary statistics of the rolling buffer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferSummary {
    pub buffer_size: usize,
    /// Last end minus first start (seconds)
    pub time_span: f64,
    pub dominant_state: EngagementState,
    pub total_words: usize,
    pub total_frames: usize,
    pub total_intervals_processed: u64,
    pub triggers_fired: u64,
}

/// Bounds of the buffered window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub duration_seconds: f64,
    pub interval_count: usize,
    pub start_time: f64,
    pub end_time: f64,
}

/// Category entry in a compact interval summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    /// Rounded to two decimals
    pub score: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechSummary {
    pub text: String,
    pub word_count: usize,
    pub is_silence: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFlags {
    pub high_confidence: bool,
    pub emotion_shift: bool,
    pub state_transition: bool,
}

/// One interval, reduced to what the advice generator needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSummary {
    /// Window midpoint, rounded to 0.1s
    pub timestamp: f64,
    pub dominant_state: EngagementState,
    pub categories: Vec<CategorySummary>,
    pub speech: SpeechSummary,
    pub flags: SummaryFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub dominant_state: EngagementState,
    pub total_words: usize,
    pub total_frames: usize,
    pub emotion_trends: BTreeMap<String, Trend>,
}

/// Dominant state changed between adjacent intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: EngagementState,
    pub to_state: EngagementState,
    pub timestamp: f64,
    /// Transcript of the interval entered
    pub text_context: String,
}

/// Interval flagged with an emotion shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionShift {
    pub timestamp: f64,
    /// Only increasing/decreasing categories
    pub categories: Vec<CategorySummary>,
    pub text_context: String,
}

/// Maximal run of consecutive silent intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilencePeriod {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub interval_count: usize,
    pub dominant_state: EngagementState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patterns {
    pub state_transitions: Vec<StateTransition>,
    pub emotion_shifts: Vec<EmotionShift>,
    pub silence_periods: Vec<SilencePeriod>,
    /// Increasing, decreasing or stable
    pub engagement_trend: Trend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateFlags {
    pub high_confidence_ratio: f64,
    pub has_emotion_shifts: bool,
    pub has_state_transitions: bool,
    pub silence_ratio: f64,
}

/// Complete structured context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub time_window: TimeWindow,
    pub intervals: Vec<IntervalSummary>,
    pub summary: ContextSummary,
    pub patterns: Patterns,
    pub flags: AggregateFlags,
}

impl Context {
    /// Zero-valued context for an empty buffer
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
