//! Core types for Coachline

mod state;
mod sample;
mod interval;
mod reason;
mod context;
mod event;
mod output;

pub use state::{EngagementState, Trend};
pub use sample::{EmotionSample, Word};
pub use interval::{Interval, IntervalFlags, SpeechSlice, TopCategory};
pub use reason::{TriggerDecision, TriggerReason};
pub use context::{
    AggregateFlags, BufferSummary, CategorySummary, Context, ContextSummary, EmotionShift,
    IntervalSummary, Patterns, SilencePeriod, SpeechSummary, StateTransition, SummaryFlags,
    TimeWindow,
};
pub use event::SessionEvent;
pub use output::EventOutcome;
