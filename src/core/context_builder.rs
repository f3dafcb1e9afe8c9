//! Context Builder: buffered intervals → structured context
//!
//! The structured `Context` is the machine view; `render_text` is the
//! compact narrative fed verbatim to a language-model advice generator.

use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::core::aggregator::majority_state;
use crate::core::timeseries::round_to;
use crate::types::{
    AggregateFlags, BufferSummary, CategorySummary, Context, ContextSummary, EmotionShift,
    Interval, IntervalSummary, Patterns, SilencePeriod, SpeechSummary, StateTransition,
    SummaryFlags, TimeWindow, Trend,
};
use crate::TOP_N_CATEGORIES;

/// Categories shown per interval in the rendered timeline
const TIMELINE_CATEGORIES: usize = 2;

/// Builds contexts from a buffer snapshot
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    engagement_threshold: f64,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl ContextBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            engagement_threshold: config.engagement_trend_threshold,
        }
    }

    /// Build a context; zero intervals yields `Context::empty()`
    pub fn build<'a, I>(
        &self,
        intervals: I,
        summary: &BufferSummary,
        trends: BTreeMap<String, Trend>,
    ) -> Context
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        let intervals: Vec<&Interval> = intervals.into_iter().collect();
        let (Some(first), Some(last)) = (intervals.first(), intervals.last()) else {
            return Context::empty();
        };

        Context {
            time_window: TimeWindow {
                duration_seconds: summary.time_span,
                interval_count: summary.buffer_size,
                start_time: first.interval_start,
                end_time: last.interval_end,
            },
            intervals: intervals.iter().map(|i| summarize(i)).collect(),
            summary: ContextSummary {
                dominant_state: summary.dominant_state,
                total_words: summary.total_words,
                total_frames: summary.total_frames,
                emotion_trends: trends,
            },
            patterns: Patterns {
                state_transitions: state_transitions(&intervals),
                emotion_shifts: emotion_shifts(&intervals),
                silence_periods: silence_periods(&intervals),
                engagement_trend: self.engagement_trend(&intervals),
            },
            flags: aggregate_flags(&intervals),
        }
    }

    /// Mean engagement ordinal, second half versus first half
    fn engagement_trend(&self, intervals: &[&Interval]) -> Trend {
        if intervals.len() < 2 {
            return Trend::Stable;
        }
        let (first, second) = intervals.split_at(intervals.len() / 2);
        Trend::from_delta(
            mean_engagement(second) - mean_engagement(first),
            self.engagement_threshold,
        )
    }

    /// Deterministic text rendering for prompts and terminals
    pub fn render_text(&self, context: &Context) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "=== PARTICIPANT ANALYSIS (Last {:.1} seconds) ===",
            context.time_window.duration_seconds
        ));
        lines.push(String::new());
        lines.push(format!(
            "Dominant State: {}",
            context.summary.dominant_state.as_str().to_uppercase()
        ));
        lines.push(format!("Engagement Trend: {}", context.patterns.engagement_trend));
        lines.push(format!("Words Spoken: {}", context.summary.total_words));
        lines.push(String::new());

        let patterns = &context.patterns;
        if !patterns.state_transitions.is_empty() {
            lines.push("State Transitions:".to_string());
            for t in &patterns.state_transitions {
                lines.push(format!("  • {} → {} at {:.1}s", t.from_state, t.to_state, t.timestamp));
                if !t.text_context.is_empty() {
                    lines.push(format!("    Said: \"{}\"", t.text_context));
                }
            }
            lines.push(String::new());
        }

        if !patterns.emotion_shifts.is_empty() {
            lines.push("Emotion Shifts:".to_string());
            for s in &patterns.emotion_shifts {
                let names = s
                    .categories
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.trend))
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("  • {} at {:.1}s", names, s.timestamp));
            }
            lines.push(String::new());
        }

        if !patterns.silence_periods.is_empty() {
            lines.push("Silence Periods:".to_string());
            for s in &patterns.silence_periods {
                lines.push(format!("  • {:.1}s silence ({} state)", s.duration, s.dominant_state));
            }
            lines.push(String::new());
        }

        lines.push("Interval Timeline:".to_string());
        if context.intervals.is_empty() {
            lines.push("  (no intervals)".to_string());
        }
        for interval in &context.intervals {
            let categories = interval
                .categories
                .iter()
                .take(TIMELINE_CATEGORIES)
                .map(|c| format!("{}({:.2})", c.name, c.score))
                .collect::<Vec<_>>()
                .join(", ");
            let text = if interval.speech.text.is_empty() {
                "[silence]"
            } else {
                interval.speech.text.as_str()
            };

            lines.push(String::new());
            lines.push(format!(
                "[{:.1}s] {}",
                interval.timestamp,
                interval.dominant_state.as_str().to_uppercase()
            ));
            lines.push(format!("  Emotions: {}", categories));
            lines.push(format!("  Said: \"{}\"", text));
        }

        lines.join("\n")
    }
}

fn category_summary(name: &str, score: f64, trend: Trend) -> CategorySummary {
    CategorySummary {
        name: name.to_string(),
        score: round_to(score, 2),
        trend,
    }
}

fn summarize(interval: &Interval) -> IntervalSummary {
    IntervalSummary {
        timestamp: round_to(interval.timestamp(), 1),
        dominant_state: interval.dominant_state,
        categories: interval
            .top_categories
            .iter()
            .take(TOP_N_CATEGORIES)
            .map(|c| category_summary(&c.name, c.avg_score, c.trend))
            .collect(),
        speech: SpeechSummary {
            text: interval.full_text.clone(),
            word_count: interval.word_count(),
            is_silence: interval.flags.silence,
        },
        flags: SummaryFlags {
            high_confidence: interval.flags.high_confidence,
            emotion_shift: interval.flags.emotion_shift,
            state_transition: interval.flags.state_transition,
        },
    }
}

/// Adjacent dominant-state changes, tagged with the entered interval's text
fn state_transitions(intervals: &[&Interval]) -> Vec<StateTransition> {
    intervals
        .windows(2)
        .filter(|pair| pair[0].dominant_state != pair[1].dominant_state)
        .map(|pair| StateTransition {
            from_state: pair[0].dominant_state,
            to_state: pair[1].dominant_state,
            timestamp: round_to(pair[1].timestamp(), 1),
            text_context: pair[1].full_text.clone(),
        })
        .collect()
}

/// Shift-flagged intervals with at least one rising or falling category
fn emotion_shifts(intervals: &[&Interval]) -> Vec<EmotionShift> {
    intervals
        .iter()
        .filter(|i| i.flags.emotion_shift)
        .filter_map(|i| {
            let categories: Vec<_> = i
                .top_categories
                .iter()
                .filter(|c| c.trend.is_shift())
                .map(|c| category_summary(&c.name, c.avg_score, c.trend))
                .collect();
            (!categories.is_empty()).then(|| EmotionShift {
                timestamp: round_to(i.timestamp(), 1),
                categories,
                text_context: i.full_text.clone(),
            })
        })
        .collect()
}

/// Maximal runs of consecutive silent intervals
fn silence_periods(intervals: &[&Interval]) -> Vec<SilencePeriod> {
    let mut periods = Vec::new();
    let mut run: Vec<&Interval> = Vec::new();

    for interval in intervals {
        if interval.flags.silence {
            run.push(interval);
        } else if !run.is_empty() {
            periods.push(close_run(&run));
            run.clear();
        }
    }
    if !run.is_empty() {
        periods.push(close_run(&run));
    }
    periods
}

fn close_run(run: &[&Interval]) -> SilencePeriod {
    let states: Vec<_> = run.iter().map(|i| i.dominant_state).collect();
    SilencePeriod {
        start: run[0].interval_start,
        end: run[run.len() - 1].interval_end,
        duration: round_to(run.iter().map(|i| i.duration()).sum(), 2),
        interval_count: run.len(),
        dominant_state: majority_state(&states),
    }
}

fn mean_engagement(intervals: &[&Interval]) -> f64 {
    let total: f64 = intervals
        .iter()
        .map(|i| f64::from(i.dominant_state.engagement_level()))
        .sum();
    total / intervals.len() as f64
}

fn aggregate_flags(intervals: &[&Interval]) -> AggregateFlags {
    let total = intervals.len() as f64;
    let ratio = |pred: fn(&Interval) -> bool| {
        round_to(intervals.iter().filter(|i| pred(i)).count() as f64 / total, 2)
    };

    AggregateFlags {
        high_confidence_ratio: ratio(|i| i.flags.high_confidence),
        has_emotion_shifts: intervals.iter().any(|i| i.flags.emotion_shift),
        has_state_transitions: intervals.iter().any(|i| i.flags.state_transition),
        silence_ratio: ratio(|i| i.flags.silence),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementState, IntervalFlags, TopCategory, Word};

    fn interval(start: f64, state: EngagementState, text: &str) -> Interval {
        let words: Vec<Word> = text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| Word::new(w, start + 0.1 * i as f64, 0.9))
            .collect();
        Interval {
            sequence: start as u64,
            interval_start: start,
            interval_end: start + 1.0,
            top_categories: vec![TopCategory {
                name: "Interest".to_string(),
                avg_score: 0.456,
                trend: Trend::Stable,
            }],
            dominant_state: state,
            frame_count: 5,
            detected_count: 5,
            flags: IntervalFlags {
                high_confidence: true,
                silence: words.is_empty(),
                ..IntervalFlags::default()
            },
            words,
            full_text: text.to_string(),
            speech_confidence: 0.9,
        }
    }

    #[test]
    fn test_empty_input() {
        let builder = ContextBuilder::default();
        let context = builder.build(Vec::<&Interval>::new(), &BufferSummary::default(), BTreeMap::new());
        assert_eq!(context, Context::empty());

        let text = builder.render_text(&context);
        assert!(text.starts_with("=== PARTICIPANT ANALYSIS"));
        assert!(text.contains("Dominant State: NEUTRAL"));
        assert!(text.contains("(no intervals)"));
    }

    #[test]
    fn test_interval_summary_rounding() {
        let summary = summarize(&interval(10.0, EngagementState::Curious, "hello"));
        assert_eq!(summary.timestamp, 10.5);
        assert_eq!(summary.categories[0].score, 0.46);
        assert_eq!(summary.speech.word_count, 1);
        assert!(!summary.speech.is_silence);
    }

    #[test]
    fn test_emotion_shift_keeps_only_moving_categories() {
        let mut shifted = interval(0.0, EngagementState::Curious, "so");
        shifted.flags.emotion_shift = true;
        shifted.top_categories.push(TopCategory {
            name: "Joy".to_string(),
            avg_score: 0.3,
            trend: Trend::Increasing,
        });
        shifted.top_categories.push(TopCategory {
            name: "Calmness".to_string(),
            avg_score: 0.2,
            trend: Trend::New,
        });

        let shifts = emotion_shifts(&[&shifted]);
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].categories.len(), 1);
        assert_eq!(shifts[0].categories[0].name, "Joy");
    }

    #[test]
    fn test_silence_runs() {
        let a = interval(0.0, EngagementState::Curious, "");
        let b = interval(1.0, EngagementState::Thinking, "");
        let c = interval(2.0, EngagementState::Thinking, "");
        let d = interval(3.0, EngagementState::Curious, "yes");
        let e = interval(4.0, EngagementState::Baseline, "");

        let periods = silence_periods(&[&a, &b, &c, &d, &e]);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].start, 0.0);
        assert_eq!(periods[0].end, 3.0);
        assert_eq!(periods[0].duration, 3.0);
        assert_eq!(periods[0].interval_count, 3);
        assert_eq!(periods[0].dominant_state, EngagementState::Thinking);
        assert_eq!(periods[1].interval_count, 1);
    }

    #[test]
    fn test_engagement_trend() {
        let builder = ContextBuilder::default();
        let low = interval(0.0, EngagementState::ClosedOff, "");
        let mid = interval(1.0, EngagementState::Baseline, "");
        let high = interval(2.0, EngagementState::Enthusiastic, "");
        let high2 = interval(3.0, EngagementState::Amused, "");

        assert_eq!(builder.engagement_trend(&[&low, &mid, &high, &high2]), Trend::Increasing);
        assert_eq!(builder.engagement_trend(&[&high, &high2, &low, &mid]), Trend::Decreasing);
        assert_eq!(builder.engagement_trend(&[&high, &high2]), Trend::Stable);
        assert_eq!(builder.engagement_trend(&[&low]), Trend::Stable);
    }

    #[test]
    fn test_aggregate_flags() {
        let mut a = interval(0.0, EngagementState::Curious, "");
        a.flags.high_confidence = false;
        let b = interval(1.0, EngagementState::Curious, "hi");
        let c = interval(2.0, EngagementState::Curious, "hi");

        let flags = aggregate_flags(&[&a, &b, &c]);
        assert_eq!(flags.high_confidence_ratio, 0.67);
        assert_eq!(flags.silence_ratio, 0.33);
        assert!(!flags.has_emotion_shifts);
    }

    #[test]
    fn test_render_sections() {
        let builder = ContextBuilder::default();
        let a = interval(10.0, EngagementState::Curious, "tell me more");
        let mut b = interval(11.0, EngagementState::Thinking, "");
        b.flags.state_transition = true;

        let summary = BufferSummary {
            buffer_size: 2,
            time_span: 2.0,
            dominant_state: EngagementState::Curious,
            total_words: 3,
            total_frames: 10,
            ..BufferSummary::default()
        };
        let context = builder.build([&a, &b], &summary, BTreeMap::new());
        let text = builder.render_text(&context);

        assert!(text.contains("Dominant State: CURIOUS"));
        assert!(text.contains("Words Spoken: 3"));
        assert!(text.contains("  • curious → thinking at 11.5s"));
        assert!(text.contains("  • 1.0s silence (thinking state)"));
        assert!(text.contains("[10.5s] CURIOUS\n  Emotions: Interest(0.46)\n  Said: \"tell me more\""));
        assert!(text.contains("[11.5s] THINKING\n  Emotions: Interest(0.46)\n  Said: \"[silence]\""));
        assert!(!text.contains("Emotion Shifts:"));
    }
}
