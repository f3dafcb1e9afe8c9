//! Interval Aggregator: per-frame samples → fixed-duration intervals
//!
//! Window lifecycle:
//! - EMPTY → ACCUMULATING: first sample after a reset starts the window clock
//! - ACCUMULATING → CLOSEABLE: `now - window_start >= window_duration`
//! - CLOSEABLE → EMPTY: `close()` emits an interval and resets accumulators
//!
//! Windows stay on a grid anchored at the first sample of the session, so
//! successive intervals are contiguous and exactly one window long.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::core::category_mapper::{CategoryMapper, Classification};
use crate::types::{EmotionSample, EngagementState, Interval, IntervalFlags, TopCategory, Trend};

/// Accumulates samples for the current window and emits closed intervals
#[derive(Debug)]
pub struct IntervalAggregator {
    mapper: CategoryMapper,
    window_duration: f64,
    top_n: usize,
    trend_threshold: f64,
    high_confidence_ratio: f64,
    /// Start of the open window, `None` while EMPTY
    window_start: Option<f64>,
    samples: Vec<EmotionSample>,
    /// Per detected sample, in arrival order
    sample_states: Vec<EngagementState>,
    /// Ranking of the last emitted interval
    previous_top: Option<Vec<TopCategory>>,
    previous_state: Option<EngagementState>,
    /// End of the last emitted interval
    last_end: Option<f64>,
    interval_count: u64,
}

impl Default for IntervalAggregator {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl IntervalAggregator {
    /// Create aggregator from pipeline settings
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            mapper: CategoryMapper::with_floor(config.category_floor),
            window_duration: config.window_duration_secs,
            top_n: config.top_n,
            trend_threshold: config.trend_threshold,
            high_confidence_ratio: config.high_confidence_ratio,
            window_start: None,
            samples: Vec::new(),
            sample_states: Vec::new(),
            previous_top: None,
            previous_state: None,
            last_end: None,
            interval_count: 0,
        }
    }

    /// Append a sample to the current window
    ///
    /// Returns the sample's classification when a subject was detected.
    pub fn add_sample(&mut self, sample: EmotionSample) -> Option<Classification> {
        if self.window_start.is_none() {
            let start = self.align(sample.timestamp);
            debug!(start, "window opened");
            self.window_start = Some(start);
        }

        let classification = if sample.detected {
            let c = self.mapper.classify(&sample.scores);
            self.sample_states.push(c.state);
            Some(c)
        } else {
            None
        };

        self.samples.push(sample);
        classification
    }

    /// Grid-aligned start for a window opened at `t`
    fn align(&self, t: f64) -> f64 {
        match self.last_end {
            Some(end) if t >= end => {
                let skipped = ((t - end) / self.window_duration).floor();
                end + skipped * self.window_duration
            }
            Some(end) => end,
            None => t,
        }
    }

    /// True iff the open window has run its full duration
    pub fn is_window_elapsed(&self, now: f64) -> bool {
        self.window_start
            .map(|start| now - start >= self.window_duration)
            .unwrap_or(false)
    }

    /// Close the current window
    ///
    /// Returns `None` when no samples were accumulated.
    pub fn close(&mut self, now: f64) -> Option<Interval> {
        let start = self.window_start?;
        if self.samples.is_empty() {
            self.reset_window();
            return None;
        }

        let end = start + self.window_duration;
        if now < end {
            debug!(now, end, "closing window before it elapsed");
        }

        let top_categories = self.rank_categories();
        let dominant_state = majority_state(&self.sample_states);

        let frame_count = self.samples.len();
        let detected_count = self.samples.iter().filter(|s| s.detected).count();

        let flags = IntervalFlags {
            high_confidence: detected_count as f64 / frame_count as f64 >= self.high_confidence_ratio,
            emotion_shift: top_categories.iter().any(|c| c.trend.is_shift()),
            state_transition: self
                .previous_state
                .map(|prev| prev != dominant_state)
                .unwrap_or(false),
            silence: false,
        };

        let interval = Interval {
            sequence: self.interval_count,
            interval_start: start,
            interval_end: end,
            top_categories,
            dominant_state,
            frame_count,
            detected_count,
            words: Vec::new(),
            full_text: String::new(),
            speech_confidence: 0.0,
            flags,
        };

        info!(
            interval = %interval.label(),
            state = %interval.dominant_state,
            frames = frame_count,
            detected = detected_count,
            "interval closed"
        );

        self.previous_top = Some(interval.top_categories.clone());
        self.previous_state = Some(dominant_state);
        self.last_end = Some(end);
        self.interval_count += 1;
        self.reset_window();

        Some(interval)
    }

    /// Average detected scores, rank, and attach trends
    fn rank_categories(&self) -> Vec<TopCategory> {
        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for sample in self.samples.iter().filter(|s| s.detected) {
            for (name, score) in &sample.scores {
                let entry = sums.entry(name.as_str()).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        let mut averages: Vec<(&str, f64)> = sums
            .into_iter()
            .map(|(name, (sum, count))| (name, sum / count as f64))
            .collect();
        averages.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        averages
            .into_iter()
            .take(self.top_n)
            .map(|(name, avg_score)| TopCategory {
                name: name.to_string(),
                avg_score,
                trend: self.trend_for(name, avg_score),
            })
            .collect()
    }

    /// Compare against the same name in the previous emitted ranking
    fn trend_for(&self, name: &str, score: f64) -> Trend {
        let Some(previous) = &self.previous_top else {
            return Trend::Stable;
        };
        match previous.iter().find(|c| c.name == name) {
            Some(prev) => Trend::from_delta(score - prev.avg_score, self.trend_threshold),
            None => Trend::New,
        }
    }

    fn reset_window(&mut self) {
        self.window_start = None;
        self.samples.clear();
        self.sample_states.clear();
    }

    /// Start of the open window
    pub fn window_start(&self) -> Option<f64> {
        self.window_start
    }

    /// End of the open window
    pub fn window_end(&self) -> Option<f64> {
        self.window_start.map(|s| s + self.window_duration)
    }

    /// Samples waiting in the open window
    pub fn pending_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of intervals emitted this session
    pub fn interval_count(&self) -> u64 {
        self.interval_count
    }

    pub fn window_duration(&self) -> f64 {
        self.window_duration
    }

    /// Discard all state for a new session
    pub fn reset_session(&mut self) {
        self.reset_window();
        self.previous_top = None;
        self.previous_state = None;
        self.last_end = None;
        self.interval_count = 0;
    }
}

/// Most frequent state; ties go to the first seen
pub(crate) fn majority_state(states: &[EngagementState]) -> EngagementState {
    let mut counts: Vec<(EngagementState, usize)> = Vec::new();
    for state in states {
        match counts.iter_mut().find(|(s, _)| s == state) {
            Some((_, count)) => *count += 1,
            None => counts.push((*state, 1)),
        }
    }

    let mut best: Option<(EngagementState, usize)> = None;
    for (state, count) in counts {
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((state, count));
        }
    }
    best.map(|(s, _)| s).unwrap_or_default()
}

// =============================================================================
// TESTS
// =============================================================================
