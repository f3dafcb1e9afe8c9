//! Category Mapper: fine-grained emotion scores → coarse engagement state
//!
//! Each category is a hand-tuned weighted sum over a subset of emotion keys.
//! The same key may appear in several categories with different weights.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CATEGORY_CONFIDENCE_FLOOR;
use crate::types::EngagementState;

type Weights = &'static [(&'static str, f64)];

// =============================================================================
// CATEGORY WEIGHTS
// =============================================================================

const CLOSED_OFF: Weights = &[
    ("Anger", 0.7),
    ("Fear", 0.6),
    ("Anxiety (negative)", 0.6),
    ("Distress", 0.5),
    ("Contempt", 0.5),
    ("Disgust", 0.4),
    ("Boredom", 0.6),
    ("Awkwardness", 0.7),
    ("Disapproval", 0.3),
    ("Sadness", 0.3),
    ("Doubt", 0.3),
    ("Pain", 0.2),
];

const BASELINE: Weights = &[
    ("Calmness", 0.8),
    ("Aesthetic Appreciation", 0.3),
    ("Contemplation", 0.2),
];

const CURIOUS: Weights = &[
    ("Interest", 0.9),
    ("Curiosity", 0.9),
    ("Concentration", 0.5),
    ("Realization", 0.5),
    ("Surprise (positive)", 0.4),
];

const AMUSED: Weights = &[
    ("Amusement", 0.9),
    ("Joy", 0.5),
    ("Satisfaction", 0.6),
    ("Entrancement", 0.4),
];

const ENTHUSIASTIC: Weights = &[
    ("Joy", 0.9),
    ("Excitement", 0.9),
    ("Admiration", 0.7),
    ("Triumph", 0.5),
    ("Ecstasy", 0.6),
    ("Surprise (positive)", 0.5),
];

const THINKING: Weights = &[
    ("Contemplation", 0.8),
    ("Concentration", 0.7),
    ("Confusion", 0.4),
    ("Realization", 0.3),
];

/// Declaration order breaks ties between equal sums
const CATEGORIES: &[(EngagementState, Weights)] = &[
    (EngagementState::ClosedOff, CLOSED_OFF),
    (EngagementState::Baseline, BASELINE),
    (EngagementState::Curious, CURIOUS),
    (EngagementState::Amused, AMUSED),
    (EngagementState::Enthusiastic, ENTHUSIASTIC),
    (EngagementState::Thinking, THINKING),
];

/// Result of mapping one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub state: EngagementState,
    /// Weighted sum of the winning category (0.0 when forced to baseline)
    pub state_score: f64,
    /// Best fine-grained emotion within the winning category
    pub representative_emotion: Option<String>,
    pub representative_score: f64,
}

/// Maps fine-grained emotion scores to coarse engagement states
#[derive(Debug, Clone)]
pub struct CategoryMapper {
    floor: f64,
}

impl Default for CategoryMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryMapper {
    /// Create mapper with the default confidence floor
    pub fn new() -> Self {
        Self::with_floor(CATEGORY_CONFIDENCE_FLOOR)
    }

    pub fn with_floor(floor: f64) -> Self {
        Self { floor }
    }

    /// Keys that make up a category; empty for neutral
    pub fn category_keys(state: EngagementState) -> impl Iterator<Item = &'static str> {
        CATEGORIES
            .iter()
            .filter(move |(s, _)| *s == state)
            .flat_map(|(_, weights)| weights.iter().map(|(k, _)| *k))
    }

    /// Weighted sum for every category, in declaration order
    pub fn category_scores(&self, scores: &HashMap<String, f64>) -> Vec<(EngagementState, f64)> {
        CATEGORIES
            .iter()
            .map(|(state, weights)| {
                let sum = weights
                    .iter()
                    .map(|(key, w)| scores.get(*key).copied().unwrap_or(0.0) * w)
                    .sum();
                (*state, sum)
            })
            .collect()
    }

    /// Classify one sample's scores
    pub fn classify(&self, scores: &HashMap<String, f64>) -> Classification {
        if scores.is_empty() {
            return Classification {
                state: EngagementState::Baseline,
                state_score: 0.0,
                representative_emotion: None,
                representative_score: 0.0,
            };
        }

        let mut best = (EngagementState::Baseline, f64::MIN);
        for (state, sum) in self.category_scores(scores) {
            if sum > best.1 {
                best = (state, sum);
            }
        }

        let (state, state_score) = if best.1 > self.floor {
            best
        } else {
            debug!(score = best.1, floor = self.floor, "all categories below floor, forcing baseline");
            (EngagementState::Baseline, 0.0)
        };

        let keys: Vec<&str> = Self::category_keys(state).collect();
        let in_category = arg_max(
            scores
                .iter()
                .filter(|(name, _)| keys.contains(&name.as_str()))
                .map(|(name, score)| (name.as_str(), *score)),
        );
        let representative = in_category
            .or_else(|| arg_max(scores.iter().map(|(name, score)| (name.as_str(), *score))));

        Classification {
            state,
            state_score,
            representative_emotion: representative.map(|(name, _)| name.to_string()),
            representative_score: representative.map(|(_, score)| score).unwrap_or(0.0),
        }
    }

    /// Quick classify - just return the state
    pub fn quick_classify(&self, scores: &HashMap<String, f64>) -> EngagementState {
        self.classify(scores).state
    }
}

/// Highest score; ties go to the lexicographically smaller name
fn arg_max<'a>(items: impl Iterator<Item = (&'a str, f64)>) -> Option<(&'a str, f64)> {
    items.fold(None, |best, (name, score)| match best {
        Some((best_name, best_score))
            if best_score > score || (best_score == score && best_name <= name) =>
        {
            Some((best_name, best_score))
        }
        _ => Some((name, score)),
    })
}

// =============================================================================
// TESTS
// =============================================================================
