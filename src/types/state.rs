//! Coarse engagement states

use serde::{Deserialize, Serialize};

/// Coarse engagement category derived from fine-grained emotion scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngagementState {
    /// Disengaged, uncomfortable, wants to exit
    ClosedOff,
    /// Calm, scanning, no strong signal
    Baseline,
    /// Interested and engaged in the exchange
    Curious,
    /// Humor landed, lighthearted
    Amused,
    /// Strong positive connection
    Enthusiastic,
    /// Processing, considering a response
    Thinking,
    /// No detected samples at all
    #[default]
    Neutral,
}

impl EngagementState {
    /// Ordinal engagement: positive > receptive > evaluative > neutral > skeptical
    pub fn engagement_level(&self) -> u8 {
        match self {
            EngagementState::Enthusiastic | EngagementState::Amused => 4,
            EngagementState::Curious => 3,
            EngagementState::Thinking => 2,
            EngagementState::Baseline | EngagementState::Neutral => 1,
            EngagementState::ClosedOff => 0,
        }
    }

    /// Wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementState::ClosedOff => "closed-off",
            EngagementState::Baseline => "baseline",
            EngagementState::Curious => "curious",
            EngagementState::Amused => "amused",
            EngagementState::Enthusiastic => "enthusiastic",
            EngagementState::Thinking => "thinking",
            EngagementState::Neutral => "neutral",
        }
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            EngagementState::ClosedOff => "\x1b[31m",    // Red
            EngagementState::Baseline => "\x1b[90m",     // Gray
            EngagementState::Curious => "\x1b[36m",      // Cyan
            EngagementState::Amused => "\x1b[33m",       // Yellow
            EngagementState::Enthusiastic => "\x1b[32m", // Green
            EngagementState::Thinking => "\x1b[35m",     // Magenta
            EngagementState::Neutral => "\x1b[37m",      // White
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            EngagementState::ClosedOff => "🔴",
            EngagementState::Baseline => "⚪",
            EngagementState::Curious => "🔵",
            EngagementState::Amused => "😄",
            EngagementState::Enthusiastic => "🟢",
            EngagementState::Thinking => "🤔",
            EngagementState::Neutral => "⚫",
        }
    }
}

impl std::fmt::Display for EngagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a score or engagement level over time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
    /// Category absent from the previous interval's ranking
    New,
}

impl Trend {
    /// Classify a delta against a symmetric threshold
    pub fn from_delta(delta: f64, threshold: f64) -> Self {
        if delta > threshold {
            Trend::Increasing
        } else if delta < -threshold {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    /// Increasing or decreasing
    pub fn is_shift(&self) -> bool {
        matches!(self, Trend::Increasing | Trend::Decreasing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::New => "new",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_ordering() {
        assert!(EngagementState::Enthusiastic.engagement_level() > EngagementState::Curious.engagement_level());
        assert!(EngagementState::Curious.engagement_level() > EngagementState::Thinking.engagement_level());
        assert!(EngagementState::Thinking.engagement_level() > EngagementState::Baseline.engagement_level());
        assert!(EngagementState::Baseline.engagement_level() > EngagementState::ClosedOff.engagement_level());
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        let json = serde_json::to_string(&EngagementState::ClosedOff).unwrap();
        assert_eq!(json, "\"closed-off\"");
        assert_eq!(EngagementState::ClosedOff.to_string(), "closed-off");
    }

    #[test]
    fn test_trend_from_delta() {
        assert_eq!(Trend::from_delta(0.10, 0.05), Trend::Increasing);
        assert_eq!(Trend::from_delta(-0.10, 0.05), Trend::Decreasing);
        assert_eq!(Trend::from_delta(0.02, 0.05), Trend::Stable);
        assert_eq!(Trend::from_delta(0.05, 0.05), Trend::Stable);
        assert!(!Trend::New.is_shift());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(EngagementState::default(), EngagementState::Neutral);
        assert_eq!(Trend::default(), Trend::Stable);
    }
}
