//! Classifier observations and transcribed words

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// One emotion-classifier observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    /// Monotonic seconds
    pub timestamp: f64,
    /// Fine-grained emotion name → score in [0, 1]
    #[serde(default)]
    pub scores: HashMap<String, f64>,
    /// False when no face/subject was found
    #[serde(default = "default_true")]
    pub detected: bool,
    /// Overall classifier confidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl EmotionSample {
    /// Detected sample with the given scores
    pub fn new<K: Into<String>>(timestamp: f64, scores: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self {
            timestamp,
            scores: scores.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            detected: true,
            confidence: None,
        }
    }

    /// Frame in which the classifier found no subject
    pub fn undetected(timestamp: f64) -> Self {
        Self {
            timestamp,
            scores: HashMap::new(),
            detected: false,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A transcribed word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    /// When the word started (used for interval matching)
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub confidence: f64,
}

impl Word {
    /// Point-in-time word
    pub fn new(text: impl Into<String>, timestamp: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start_timestamp: timestamp,
            end_timestamp: timestamp,
            confidence,
        }
    }

    /// Word spanning `[start, end)`
    pub fn spanning(text: impl Into<String>, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start_timestamp: start,
            end_timestamp: end.max(start),
            confidence,
        }
    }

    /// Timestamp used for interval assignment
    pub fn timestamp(&self) -> f64 {
        self.start_timestamp
    }
}
