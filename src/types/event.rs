//! Events delivered to a session by the transport layer

use serde::{Deserialize, Serialize};

use crate::types::{EmotionSample, Interval};

fn default_confidence() -> f64 {
    1.0
}

/// One input event, processed strictly in arrival order per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Classified frame; its timestamp doubles as the current time
    Sample(EmotionSample),
    /// Single transcribed word
    Word {
        text: String,
        timestamp: f64,
        #[serde(default = "default_confidence")]
        confidence: f64,
    },
    /// Transcribed phrase; word times are spread across `[start, end)`
    Segment {
        text: String,
        start: f64,
        end: f64,
        #[serde(default = "default_confidence")]
        confidence: f64,
    },
    /// Clock tick, checks whether the current window elapsed
    Tick { now: f64 },
    /// Interval closed upstream, pushed straight into the buffer
    Interval { interval: Interval, now: f64 },
}

impl SessionEvent {
    /// Event kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Sample(_) => "sample",
            SessionEvent::Word { .. } => "word",
            SessionEvent::Segment { .. } => "segment",
            SessionEvent::Tick { .. } => "tick",
            SessionEvent::Interval { .. } => "interval",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_lines() {
        let sample: SessionEvent = serde_json::from_str(
            r#"{"type": "sample", "timestamp": 1.0, "scores": {"Interest": 0.6}}"#,
        )
        .unwrap();
        assert_eq!(sample.kind(), "sample");

        let word: SessionEvent =
            serde_json::from_str(r#"{"type": "word", "text": "hi", "timestamp": 1.2}"#).unwrap();
        match word {
            SessionEvent::Word { confidence, .. } => assert_eq!(confidence, 1.0),
            other => panic!("unexpected event {:?}", other),
        }

        let tick: SessionEvent = serde_json::from_str(r#"{"type": "tick", "now": 2.0}"#).unwrap();
        assert_eq!(tick, SessionEvent::Tick { now: 2.0 });
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result = serde_json::from_str::<SessionEvent>(r#"{"type": "frame"}"#);
        assert!(result.is_err());
    }
}
