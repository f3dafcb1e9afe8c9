//! Coachline: time-series aggregation of emotion samples and speech
//!
//! Pipeline: EmotionSample → CategoryMapper → IntervalAggregator →
//! SpeechMapper → TimeSeriesBuffer → ContextBuilder → advice generator

pub mod config;
pub mod core;
pub mod error;
pub mod types;

pub use error::{PipelineError, PipelineResult};

// =============================================================================
// WINDOWING
// =============================================================================

/// Duration of one aggregation interval (seconds)
pub const WINDOW_DURATION_SECS: f64 = 1.0;

/// Number of closed intervals kept in the rolling buffer
pub const BUFFER_CAPACITY: usize = 4;

/// Number of ranked categories kept per interval
pub const TOP_N_CATEGORIES: usize = 3;

// =============================================================================
// TRENDS & FLAGS
// =============================================================================

/// Score delta beyond which a category counts as increasing/decreasing
pub const TREND_THRESHOLD: f64 = 0.05;

/// Fraction of detected samples needed for `high_confidence`
pub const HIGH_CONFIDENCE_RATIO: f64 = 0.8;

/// Ordinal delta beyond which the engagement trend is not stable
pub const ENGAGEMENT_TREND_THRESHOLD: f64 = 0.5;

/// Weighted category sum must exceed this, otherwise baseline wins
pub const CATEGORY_CONFIDENCE_FLOOR: f64 = 0.10;

// =============================================================================
// SPEECH
// =============================================================================

/// How far before an interval start a late word may still be attributed
pub const LOOKBACK_SECS: f64 = 5.0;

/// Gap between consecutive words that marks an interval as silent
pub const SILENCE_THRESHOLD_SECS: f64 = 0.99;

/// Pending words older than this are flushed on every tick
pub const STALE_WORD_MAX_AGE_SECS: f64 = 10.0;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "0.1.0";
