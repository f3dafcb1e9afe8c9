//! Per-session pipeline state and the store that owns it
//!
//! A `Session` bundles one aggregator, speech mapper, buffer and context
//! builder. Nothing is shared between sessions; each sits behind its own
//! mutex so events for one subject are applied strictly in sequence.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::core::advice::Advice;
use crate::core::aggregator::IntervalAggregator;
use crate::core::context_builder::ContextBuilder;
use crate::core::speech_mapper::{SpeechMapper, SpeechStats};
use crate::core::timeseries::TimeSeriesBuffer;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{
    Context, EmotionSample, EngagementState, EventOutcome, Interval, SessionEvent, TriggerDecision,
};

/// Capacity of each session's live-update channel
const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Live update pushed to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    Interval {
        interval: Interval,
        trigger: TriggerDecision,
    },
    Context {
        context: Context,
        rendered: String,
    },
    Advice {
        advice: Advice,
    },
    Reset {
        reason: String,
    },
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub events_processed: u64,
    pub intervals_processed: u64,
    pub triggers_fired: u64,
    pub buffer_size: usize,
    pub dominant_state: EngagementState,
    pub window_start: Option<f64>,
    pub pending_samples: usize,
    pub speech: SpeechStats,
}

/// One subject's pipeline
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    config: PipelineConfig,
    aggregator: IntervalAggregator,
    speech: SpeechMapper,
    buffer: TimeSeriesBuffer,
    builder: ContextBuilder,
    last_context: Option<Context>,
    events_processed: u64,
    updates: broadcast::Sender<SessionUpdate>,
}

impl Session {
    pub fn new(id: impl Into<String>, config: PipelineConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            id: id.into(),
            created_at: Utc::now(),
            aggregator: IntervalAggregator::new(&config),
            speech: SpeechMapper::new(&config),
            buffer: TimeSeriesBuffer::new(&config),
            builder: ContextBuilder::new(&config),
            config,
            last_context: None,
            events_processed: 0,
            updates,
        }
    }

    /// Apply one event in arrival order
    ///
    /// A sample at or past the open window's end closes that window first.
    /// Ticks also bound the pending-word queue.
    pub fn handle_event(&mut self, event: SessionEvent) -> PipelineResult<EventOutcome> {
        debug!(session = %self.id, kind = event.kind(), "event");
        self.events_processed += 1;

        match event {
            SessionEvent::Sample(sample) => {
                let now = sample.timestamp;
                self.on_sample(sample, now)
            }
            SessionEvent::Word {
                text,
                timestamp,
                confidence,
            } => {
                self.on_word(text, timestamp, confidence);
                Ok(EventOutcome::idle())
            }
            SessionEvent::Segment {
                text,
                start,
                end,
                confidence,
            } => {
                self.on_segment(&text, start, end, confidence);
                Ok(EventOutcome::idle())
            }
            SessionEvent::Tick { now } => {
                self.speech
                    .flush_stale(now, self.config.stale_word_max_age_secs);
                self.advance(now)
            }
            SessionEvent::Interval { interval, now } => self.ingest_closed_interval(interval, now),
        }
    }

    /// Close an elapsed window and push it through the buffer
    fn advance(&mut self, now: f64) -> PipelineResult<EventOutcome> {
        match self.maybe_close_window(now) {
            Some(interval) => self.ingest_closed_interval(interval, now),
            None => Ok(EventOutcome::idle()),
        }
    }

    /// Feed one classified sample, closing the open window first if `now` is past it
    pub fn on_sample(&mut self, sample: EmotionSample, now: f64) -> PipelineResult<EventOutcome> {
        let outcome = self.advance(now)?;
        if let Some(c) = self.aggregator.add_sample(sample) {
            debug!(session = %self.id, state = %c.state, "sample classified");
        }
        Ok(outcome)
    }

    pub fn on_word(&mut self, text: impl Into<String>, timestamp: f64, confidence: f64) {
        self.speech.add_word(text, timestamp, confidence);
    }

    pub fn on_segment(&mut self, text: &str, start: f64, end: f64, confidence: f64) {
        self.speech.add_segment(text, start, end, confidence);
    }

    /// Close the window if it has elapsed, merging its speech
    pub fn maybe_close_window(&mut self, now: f64) -> Option<Interval> {
        if !self.aggregator.is_window_elapsed(now) {
            return None;
        }
        let interval = self.aggregator.close(now)?;
        let speech = self
            .speech
            .map_to_interval(interval.interval_start, interval.interval_end);
        Some(interval.with_speech(speech))
    }

    /// Buffer a closed interval and build a context if that fires a trigger
    ///
    /// Structural violations reset the session.
    pub fn ingest_closed_interval(
        &mut self,
        interval: Interval,
        now: f64,
    ) -> PipelineResult<EventOutcome> {
        let decision = match self.buffer.add_interval(interval.clone(), now) {
            Ok(decision) => decision,
            Err(e) => {
                if e.is_session_corrupting() {
                    warn!(session = %self.id, error = %e, "session corrupted, resetting");
                    self.session_reset();
                    self.publish(SessionUpdate::Reset {
                        reason: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        self.publish(SessionUpdate::Interval {
            interval: interval.clone(),
            trigger: decision,
        });
        let context = decision.should_trigger.then(|| self.on_trigger());

        Ok(EventOutcome {
            timestamp: Utc::now(),
            interval: Some(interval),
            trigger: Some(decision),
            context,
        })
    }

    /// Build, publish and keep the context for a fired trigger
    fn on_trigger(&mut self) -> Context {
        let context = self.build_context();
        let rendered = self.render_context(&context);
        self.publish(SessionUpdate::Context {
            context: context.clone(),
            rendered,
        });
        self.last_context = Some(context.clone());
        context
    }

    /// Context over the current buffer
    pub fn build_context(&self) -> Context {
        self.builder.build(
            self.buffer.intervals(),
            &self.buffer.summary(),
            self.buffer.emotion_trends(),
        )
    }

    pub fn render_context(&self, context: &Context) -> String {
        self.builder.render_text(context)
    }

    /// Context built by the most recent trigger
    pub fn last_context(&self) -> Option<&Context> {
        self.last_context.as_ref()
    }

    /// Discard all per-session pipeline state
    pub fn session_reset(&mut self) {
        info!(session = %self.id, "session reset");
        self.aggregator.reset_session();
        self.speech.reset_session();
        self.buffer.reset_session();
        self.last_context = None;
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            created_at: self.created_at,
            events_processed: self.events_processed,
            intervals_processed: self.buffer.total_intervals(),
            triggers_fired: self.buffer.triggers_fired(),
            buffer_size: self.buffer.len(),
            dominant_state: self.buffer.summary().dominant_state,
            window_start: self.aggregator.window_start(),
            pending_samples: self.aggregator.pending_samples(),
            speech: self.speech.stats(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Send to live subscribers, if any
    pub fn publish(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Session registry with explicit create/destroy lifecycle
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    config: PipelineConfig,
    max_sessions: usize,
    next_seq: AtomicU64,
}

impl SessionStore {
    pub fn new(config: PipelineConfig, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            max_sessions,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Create a session with fresh pipeline state
    pub async fn create(&self) -> PipelineResult<(String, Arc<Mutex<Session>>)> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(PipelineError::SessionLimit {
                current: sessions.len(),
                max: self.max_sessions,
            });
        }

        let id = self.generate_id();
        let session = Arc::new(Mutex::new(Session::new(id.clone(), self.config.clone())));
        sessions.insert(id.clone(), Arc::clone(&session));
        info!(session = %id, active = sessions.len(), "session created");
        Ok((id, session))
    }

    pub async fn get(&self, id: &str) -> PipelineResult<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::SessionNotFound(id.to_string()))
    }

    /// Drop a session; any partial window is discarded
    pub async fn destroy(&self, id: &str) -> PipelineResult<()> {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(_) => {
                info!(session = %id, "session destroyed");
                Ok(())
            }
            None => Err(PipelineError::SessionNotFound(id.to_string())),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn generate_id(&self) -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("session_{:x}_{}", nanos, seq)
    }
}

// =============================================================================
// TESTS
// =============================================================================
