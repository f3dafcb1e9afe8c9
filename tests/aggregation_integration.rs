//! Integration tests for the aggregation stages
//!
//! Tests window contiguity, trends, category mapping, lookback,
//! silence detection and the trigger policy through the public API.

use coachline::config::PipelineConfig;
use coachline::core::{CategoryMapper, IntervalAggregator, SpeechMapper, TimeSeriesBuffer};
use coachline::types::{EmotionSample, EngagementState, Interval, Trend, TriggerReason};
use std::collections::HashMap;

fn sample(t: f64, pairs: &[(&str, f64)]) -> EmotionSample {
    EmotionSample::new(t, pairs.iter().map(|(k, v)| (*k, *v)))
}

/// Drive an aggregator at a fixed tick period, closing whenever a window elapses
fn drive(agg: &mut IntervalAggregator, start: f64, ticks: usize, period: f64) -> Vec<Interval> {
    let mut intervals = Vec::new();
    for i in 0..ticks {
        let now = start + i as f64 * period;
        if agg.is_window_elapsed(now) {
            intervals.extend(agg.close(now));
        }
        agg.add_sample(sample(now, &[("Interest", 0.5), ("Calmness", 0.3)]));
    }
    intervals
}

#[test]
fn test_window_contiguity_at_odd_tick_rate() {
    let mut agg = IntervalAggregator::default();
    // 0.3s ticks rarely land on a window boundary
    let intervals = drive(&mut agg, 1000.0, 70, 0.3);

    assert!(intervals.len() >= 8);
    for pair in intervals.windows(2) {
        assert_eq!(pair[0].interval_end, pair[1].interval_start);
    }
    for interval in &intervals {
        assert_eq!(interval.interval_end - interval.interval_start, 1.0);
    }
    let sequences: Vec<_> = intervals.iter().map(|i| i.sequence).collect();
    let expected: Vec<_> = (0..intervals.len() as u64).collect();
    assert_eq!(sequences, expected);
}

#[test]
fn test_window_duration_from_config() {
    let config = PipelineConfig {
        window_duration_secs: 0.5,
        ..PipelineConfig::default()
    };
    let mut agg = IntervalAggregator::new(&config);
    let intervals = drive(&mut agg, 0.0, 40, 0.125);

    assert_eq!(intervals.len(), 9);
    for interval in &intervals {
        assert_eq!(interval.duration(), 0.5);
    }
}

#[test]
fn test_interest_trend_across_windows() {
    let mut agg = IntervalAggregator::default();

    agg.add_sample(sample(0.0, &[("Interest", 0.40)]));
    agg.add_sample(sample(0.5, &[("Interest", 0.40)]));
    agg.close(1.0).unwrap();

    agg.add_sample(sample(1.0, &[("Interest", 0.50)]));
    agg.add_sample(sample(1.5, &[("Interest", 0.50)]));
    let second = agg.close(2.0).unwrap();
    assert_eq!(second.top_categories[0].trend, Trend::Increasing);
    assert!(second.flags.emotion_shift);

    agg.add_sample(sample(2.0, &[("Interest", 0.52)]));
    let third = agg.close(3.0).unwrap();
    assert_eq!(third.top_categories[0].trend, Trend::Stable);
}

#[test]
fn test_representative_from_winning_category() {
    let mapper = CategoryMapper::new();
    let scores: HashMap<String, f64> = [("Interest", 0.6), ("Confusion", 0.9)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    let result = mapper.classify(&scores);
    assert_eq!(result.state, EngagementState::Curious);
    assert_eq!(result.representative_emotion.as_deref(), Some("Interest"));
}

#[test]
fn test_lookback_boundaries() {
    let mut mapper = SpeechMapper::default();
    mapper.add_word("three-before", 7.0, 1.0);
    mapper.add_word("six-before", 4.0, 1.0);
    mapper.add_word("half-in", 10.5, 1.0);

    let slice = mapper.map_to_interval(10.0, 11.0);
    let texts: Vec<_> = slice.words.iter().map(|w| w.text.as_str()).collect();
    assert_eq!(texts, vec!["three-before", "half-in"]);
    assert_eq!(mapper.pending_word_count(), 0);
    assert_eq!(mapper.stats().stale_words_discarded, 1);
}

#[test]
fn test_lookback_lower_bound_is_inclusive() {
    let mut mapper = SpeechMapper::default();
    mapper.add_word("edge", 5.0, 1.0);
    mapper.add_word("past-edge", 4.99, 1.0);

    let slice = mapper.map_to_interval(10.0, 11.0);
    assert_eq!(slice.full_text, "edge");
    assert_eq!(mapper.stats().stale_words_discarded, 1);
}

#[test]
fn test_future_words_wait_for_their_interval() {
    let mut mapper = SpeechMapper::default();
    mapper.add_word("later", 11.2, 1.0);

    let first = mapper.map_to_interval(10.0, 11.0);
    assert!(first.words.is_empty());
    assert!(first.is_silence);

    let second = mapper.map_to_interval(11.0, 12.0);
    assert_eq!(second.full_text, "later");
    assert!(!second.is_silence);
}

#[test]
fn test_silence_detection() {
    let mut mapper = SpeechMapper::default();
    assert!(mapper.map_to_interval(0.0, 1.0).is_silence);

    mapper.add_word("a", 1.00, 1.0);
    mapper.add_word("b", 1.05, 1.0);
    mapper.add_word("c", 1.10, 1.0);
    assert!(!mapper.map_to_interval(1.0, 2.0).is_silence);
}

#[test]
fn test_trigger_policy_fourth_and_fifth() {
    let mut agg = IntervalAggregator::default();
    let mut buffer = TimeSeriesBuffer::default();
    let mut decisions = Vec::new();

    for i in 0..5 {
        let t = i as f64;
        agg.add_sample(sample(t, &[("Calmness", 0.6)]));
        let interval = agg.close(t + 1.0).unwrap();
        assert!(!interval.flags.emotion_shift);
        assert!(!interval.flags.state_transition);
        decisions.push(buffer.add_interval(interval, t + 1.0).unwrap());
    }

    assert!(!decisions[2].should_trigger);
    assert!(decisions[3].should_trigger);
    assert_eq!(decisions[3].reason, TriggerReason::T002_FIRST_FULL_BUFFER);
    assert!(!decisions[4].should_trigger);
    assert_eq!(buffer.len(), 4);
}
