//! Time-Series Buffer: rolling window of closed intervals
//!
//! Trigger policy, evaluated after each append:
//! 1. Buffer below capacity → never fire
//! 2. First time full → fire
//! 3. Otherwise fire on periodic cadence, or when either of the two most
//!    recent intervals carries an emotion shift or a state transition
//!
//! Every firing restarts the periodic clock.

use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::core::aggregator::majority_state;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{BufferSummary, Interval, Trend, TriggerDecision, TriggerReason};

/// How many trailing intervals the event-driven checks look at
const RECENT_INTERVALS: usize = 2;

/// Fixed-capacity FIFO of intervals plus trigger timing
#[derive(Debug)]
pub struct TimeSeriesBuffer {
    capacity: usize,
    update_interval: f64,
    trend_threshold: f64,
    intervals: VecDeque<Interval>,
    last_trigger: Option<f64>,
    /// Survives `reset_buffer` so ordering is still enforced
    last_end: Option<f64>,
    total_intervals: u64,
    triggers_fired: u64,
}

impl Default for TimeSeriesBuffer {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl TimeSeriesBuffer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            capacity: config.buffer_capacity.max(1),
            update_interval: config.update_interval(),
            trend_threshold: config.trend_threshold,
            intervals: VecDeque::with_capacity(config.buffer_capacity),
            last_trigger: None,
            last_end: None,
            total_intervals: 0,
            triggers_fired: 0,
        }
    }

    /// Append a closed interval and decide whether to build a context
    ///
    /// Bad bounds or out-of-order delivery are session-corrupting errors.
    pub fn add_interval(&mut self, interval: Interval, now: f64) -> PipelineResult<TriggerDecision> {
        if interval.interval_end <= interval.interval_start {
            return Err(PipelineError::InvalidInterval {
                start: interval.interval_start,
                end: interval.interval_end,
            });
        }
        if let Some(last_end) = self.last_end {
            if interval.interval_start < last_end {
                return Err(PipelineError::OutOfOrderInterval {
                    start: interval.interval_start,
                    last_end,
                });
            }
        }

        if self.intervals.len() == self.capacity {
            self.intervals.pop_front();
        }
        self.last_end = Some(interval.interval_end);
        self.intervals.push_back(interval);
        self.total_intervals += 1;

        let reason = self.evaluate(now);
        let decision = TriggerDecision::from_reason(reason);
        if decision.should_trigger {
            self.last_trigger = Some(now);
            self.triggers_fired += 1;
            info!(reason = reason.code(), fired = self.triggers_fired, "context trigger");
        } else {
            debug!(reason = reason.code(), size = self.intervals.len(), "no trigger");
        }

        Ok(decision)
    }

    fn evaluate(&self, now: f64) -> TriggerReason {
        if self.intervals.len() < self.capacity {
            return TriggerReason::T001_BUFFER_FILLING;
        }
        let Some(last) = self.last_trigger else {
            return TriggerReason::T002_FIRST_FULL_BUFFER;
        };

        if now - last >= self.update_interval {
            TriggerReason::T003_PERIODIC
        } else if self.recent().any(|i| i.flags.emotion_shift) {
            TriggerReason::T004_EMOTION_SHIFT
        } else if self.recent().any(|i| i.flags.state_transition) {
            TriggerReason::T005_STATE_TRANSITION
        } else {
            TriggerReason::T006_NOT_DUE
        }
    }

    fn recent(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter().rev().take(RECENT_INTERVALS)
    }

    /// Buffered intervals, oldest first
    pub fn intervals(&self) -> &VecDeque<Interval> {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.intervals.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Aggregate statistics over the buffered intervals
    pub fn summary(&self) -> BufferSummary {
        let (Some(first), Some(last)) = (self.intervals.front(), self.intervals.back()) else {
            return BufferSummary {
                total_intervals_processed: self.total_intervals,
                triggers_fired: self.triggers_fired,
                ..BufferSummary::default()
            };
        };

        let states: Vec<_> = self.intervals.iter().map(|i| i.dominant_state).collect();

        BufferSummary {
            buffer_size: self.intervals.len(),
            time_span: round_to(last.interval_end - first.interval_start, 1),
            dominant_state: majority_state(&states),
            total_words: self.intervals.iter().map(Interval::word_count).sum(),
            total_frames: self.intervals.iter().map(|i| i.frame_count).sum(),
            total_intervals_processed: self.total_intervals,
            triggers_fired: self.triggers_fired,
        }
    }

    /// First-half versus second-half mean of every ranked category
    ///
    /// Each category is split over its own appearances, by index.
    pub fn emotion_trends(&self) -> BTreeMap<String, Trend> {
        if self.intervals.len() < 2 {
            return BTreeMap::new();
        }

        let mut timeline: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for interval in &self.intervals {
            for category in &interval.top_categories {
                timeline
                    .entry(category.name.as_str())
                    .or_default()
                    .push(category.avg_score);
            }
        }

        timeline
            .into_iter()
            .map(|(name, scores)| {
                let trend = if scores.len() < 2 {
                    Trend::Stable
                } else {
                    let (first, second) = scores.split_at(scores.len() / 2);
                    Trend::from_delta(mean(second) - mean(first), self.trend_threshold)
                };
                (name.to_string(), trend)
            })
            .collect()
    }

    /// Intervals added this session
    pub fn total_intervals(&self) -> u64 {
        self.total_intervals
    }

    pub fn triggers_fired(&self) -> u64 {
        self.triggers_fired
    }

    /// Drop buffered intervals, keep counters and trigger clock
    pub fn reset_buffer(&mut self) {
        self.intervals.clear();
    }

    /// Discard all state for a new session
    pub fn reset_session(&mut self) {
        self.intervals.clear();
        self.last_trigger = None;
        self.last_end = None;
        self.total_intervals = 0;
        self.triggers_fired = 0;
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// TESTS
// =============================================================================
