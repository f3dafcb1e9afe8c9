//! Output structures for terminal display and transport

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::types::{Context, EngagementState, Interval, TriggerDecision};

/// What one event produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOutcome {
    /// When the event was processed
    pub timestamp: DateTime<Utc>,
    /// Interval closed by this event, if any
    pub interval: Option<Interval>,
    /// Buffer decision for that interval
    pub trigger: Option<TriggerDecision>,
    /// Built when the decision fired
    pub context: Option<Context>,
}

impl EventOutcome {
    /// Event that closed nothing
    pub fn idle() -> Self {
        Self {
            timestamp: Utc::now(),
            interval: None,
            trigger: None,
            context: None,
        }
    }

    pub fn triggered(&self) -> bool {
        self.trigger.map(|t| t.should_trigger).unwrap_or(false)
    }
}

impl Interval {
    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.dominant_state.color_code();
        let reset = EngagementState::color_reset();
        let emoji = self.dominant_state.emoji();

        format!(
            "{}{} [{}] state={} | {} | frames={}/{} | words={}{}",
            color,
            emoji,
            self.label(),
            self.dominant_state,
            self.categories_string(),
            self.detected_count,
            self.frame_count,
            self.word_count(),
            reset
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "interval={} | state={} | top={} | frames={}/{} | words={} | shift={} | transition={} | silence={}",
            self.label(),
            self.dominant_state,
            self.categories_string(),
            self.detected_count,
            self.frame_count,
            self.word_count(),
            self.flags.emotion_shift,
            self.flags.state_transition,
            self.flags.silence
        )
    }

    fn categories_string(&self) -> String {
        if self.top_categories.is_empty() {
            return "-".to_string();
        }
        self.top_categories
            .iter()
            .map(|c| format!("{}={:.2}({})", c.name, c.avg_score, c.trend))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntervalFlags, TopCategory, Trend};

    #[test]
    fn test_parseable_string() {
        let interval = Interval {
            sequence: 3,
            interval_start: 2.0,
            interval_end: 3.0,
            top_categories: vec![TopCategory {
                name: "Joy".to_string(),
                avg_score: 0.456,
                trend: Trend::Increasing,
            }],
            dominant_state: EngagementState::Enthusiastic,
            frame_count: 3,
            detected_count: 2,
            words: Vec::new(),
            full_text: String::new(),
            speech_confidence: 0.0,
            flags: IntervalFlags {
                emotion_shift: true,
                silence: true,
                ..IntervalFlags::default()
            },
        };

        let line = interval.to_parseable_string();
        assert!(line.starts_with("interval=2.0-3.0s | state=enthusiastic"));
        assert!(line.contains("Joy=0.46(increasing)"));
        assert!(line.contains("frames=2/3"));
        assert!(line.contains("shift=true"));
        assert!(interval.to_terminal_string().contains("enthusiastic"));
    }

    #[test]
    fn test_idle_outcome() {
        let outcome = EventOutcome::idle();
        assert!(!outcome.triggered());
        assert!(outcome.interval.is_none());
    }
}
