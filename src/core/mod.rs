//! Core modules for Coachline

pub mod category_mapper;
pub mod aggregator;
pub mod speech_mapper;
pub mod timeseries;
pub mod context_builder;
pub mod advice;
pub mod session;
pub mod api;

pub use category_mapper::{CategoryMapper, Classification};
pub use aggregator::IntervalAggregator;
pub use speech_mapper::{SpeechMapper, SpeechStats};
pub use timeseries::TimeSeriesBuffer;
pub use context_builder::ContextBuilder;
pub use advice::{advise, Advice, AdviceCache, AdviceGenerator, AdviceSource, CacheStats, FallbackAdvisor};
pub use session::{Session, SessionStatus, SessionStore, SessionUpdate};
pub use api::{create_router, create_router_with, run_server};
