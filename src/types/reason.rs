//! Reason codes for context-trigger decisions

use serde::{Deserialize, Serialize};

/// Why the time-series buffer did or did not fire a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum TriggerReason {
    /// Buffer not yet at capacity
    T001_BUFFER_FILLING,
    /// Buffer full for the first time
    T002_FIRST_FULL_BUFFER,
    /// Periodic cadence elapsed
    T003_PERIODIC,
    /// Recent interval flagged an emotion shift
    T004_EMOTION_SHIFT,
    /// Recent interval flagged a state transition
    T005_STATE_TRANSITION,
    /// Nothing new worth reporting
    T006_NOT_DUE,
}

impl TriggerReason {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::T001_BUFFER_FILLING => "T001_BUFFER_FILLING",
            Self::T002_FIRST_FULL_BUFFER => "T002_FIRST_FULL_BUFFER",
            Self::T003_PERIODIC => "T003_PERIODIC",
            Self::T004_EMOTION_SHIFT => "T004_EMOTION_SHIFT",
            Self::T005_STATE_TRANSITION => "T005_STATE_TRANSITION",
            Self::T006_NOT_DUE => "T006_NOT_DUE",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::T001_BUFFER_FILLING => "Buffer still filling",
            Self::T002_FIRST_FULL_BUFFER => "First full buffer",
            Self::T003_PERIODIC => "Update interval elapsed",
            Self::T004_EMOTION_SHIFT => "Emotion shift in recent intervals",
            Self::T005_STATE_TRANSITION => "State transition in recent intervals",
            Self::T006_NOT_DUE => "No update due",
        }
    }

    /// Does this reason fire a trigger?
    pub fn fires(&self) -> bool {
        !matches!(self, Self::T001_BUFFER_FILLING | Self::T006_NOT_DUE)
    }
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// Outcome of adding an interval to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub should_trigger: bool,
    pub reason: TriggerReason,
}

impl TriggerDecision {
    pub fn from_reason(reason: TriggerReason) -> Self {
        Self {
            should_trigger: reason.fires(),
            reason,
        }
    }
}
