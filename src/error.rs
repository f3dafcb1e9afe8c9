//! Error types for the aggregation pipeline
//!
//! Only structural violations are errors. Empty windows, stale words and
//! missing detections degrade to "no data this tick".

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Interval bounds are not strictly increasing
    #[error("Invalid interval: end {end:.3} <= start {start:.3}")]
    InvalidInterval { start: f64, end: f64 },

    /// Interval delivered into the buffer before the last buffered one ended
    #[error("Out-of-order interval: starts at {start:.3}, last buffered ends at {last_end:.3}")]
    OutOfOrderInterval { start: f64, last_end: f64 },

    /// No session with this id
    #[error("Session {0} not found")]
    SessionNotFound(String),

    /// Session store is full
    #[error("Session limit reached: {current} >= {max}")]
    SessionLimit { current: usize, max: usize },

    /// External advice generator failed
    #[error("Advice error: {0}")]
    Advice(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create an advice error
    pub fn advice(msg: impl Into<String>) -> Self {
        Self::Advice(msg.into())
    }

    /// Structural violations corrupt the session; it must be reset
    pub fn is_session_corrupting(&self) -> bool {
        matches!(
            self,
            Self::InvalidInterval { .. } | Self::OutOfOrderInterval { .. }
        )
    }
}
