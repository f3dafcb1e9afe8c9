//! Integration tests for a session driven by recorded events
//!
//! Events are parsed from JSON lines exactly as the replay CLI reads them.

use coachline::config::PipelineConfig;
use coachline::core::{Session, SessionUpdate};
use coachline::types::{EngagementState, SessionEvent, TriggerReason};

fn recorded_events() -> Vec<SessionEvent> {
    let mut lines = vec![
        r#"{"type": "segment", "text": "tell me about pricing", "start": 1.0, "end": 1.8, "confidence": 0.9}"#
            .to_string(),
    ];
    for i in 0..24 {
        let t = i as f64 * 0.25;
        lines.push(format!(
            r#"{{"type": "sample", "timestamp": {}, "scores": {{"Interest": 0.7, "Calmness": 0.2}}}}"#,
            t
        ));
    }
    lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_replay_produces_intervals_and_one_trigger() {
    let mut session = Session::new("replay", PipelineConfig::default());
    let mut outcomes = Vec::new();
    for event in recorded_events() {
        outcomes.push(session.handle_event(event).unwrap());
    }

    let intervals: Vec<_> = outcomes.iter().filter_map(|o| o.interval.as_ref()).collect();
    assert_eq!(intervals.len(), 5);
    for interval in &intervals {
        assert_eq!(interval.dominant_state, EngagementState::Curious);
        assert_eq!(interval.frame_count, 4);
    }
    assert_eq!(intervals[1].full_text, "tell me about pricing");
    assert!(!intervals[1].flags.silence);
    assert!(intervals[0].flags.silence);

    let fired: Vec<_> = outcomes.iter().filter(|o| o.triggered()).collect();
    assert_eq!(fired.len(), 1);
    let trigger = fired[0].trigger.unwrap();
    assert_eq!(trigger.reason, TriggerReason::T002_FIRST_FULL_BUFFER);

    let context = fired[0].context.as_ref().unwrap();
    assert_eq!(context.time_window.interval_count, 4);
    assert_eq!(context.summary.total_words, 4);
    assert_eq!(context.flags.silence_ratio, 0.75);
    assert_eq!(session.last_context(), Some(context));

    let status = session.status();
    assert_eq!(status.events_processed, 25);
    assert_eq!(status.intervals_processed, 5);
    assert_eq!(status.triggers_fired, 1);
    assert_eq!(status.buffer_size, 4);
    assert_eq!(status.window_start, Some(5.0));
    assert_eq!(status.pending_samples, 4);
}

#[test]
fn test_subscribers_see_intervals_and_context() {
    let mut session = Session::new("live", PipelineConfig::default());
    let mut updates = session.subscribe();

    for event in recorded_events() {
        session.handle_event(event).unwrap();
    }

    let mut intervals = 0;
    let mut contexts = 0;
    while let Ok(update) = updates.try_recv() {
        match update {
            SessionUpdate::Interval { .. } => intervals += 1,
            SessionUpdate::Context { rendered, .. } => {
                contexts += 1;
                assert!(rendered.contains("Dominant State: CURIOUS"));
            }
            other => panic!("unexpected update {:?}", other),
        }
    }
    assert_eq!(intervals, 5);
    assert_eq!(contexts, 1);
}

#[test]
fn test_reset_starts_a_fresh_grid() {
    let mut session = Session::new("reset", PipelineConfig::default());
    for event in recorded_events() {
        session.handle_event(event).unwrap();
    }
    session.session_reset();

    let status = session.status();
    assert_eq!(status.buffer_size, 0);
    assert_eq!(status.pending_samples, 0);
    assert_eq!(status.window_start, None);
    assert!(session.last_context().is_none());

    // Earlier timestamps are accepted after a reset
    let outcome = session
        .handle_event(serde_json::from_str(r#"{"type": "sample", "timestamp": 0.5, "scores": {}}"#).unwrap())
        .unwrap();
    assert!(outcome.interval.is_none());
    assert_eq!(session.status().window_start, Some(0.5));
}
