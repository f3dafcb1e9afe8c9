//! HTTP + WebSocket API for Coachline
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /session/new - Create new session
//! - GET /session/{id} - Session status
//! - DELETE /session/{id} - Destroy session
//! - POST /session/{id}/reset - Discard session state
//! - POST /session/{id}/sample|word|segment|tick - Feed events
//! - POST /session/{id}/interval - Ingest an externally closed interval
//! - GET /session/{id}/context - Structured context over the buffer
//! - GET /session/{id}/context/text - Rendered context
//! - GET /cache/stats - Advice cache counters
//! - WS /ws/{id} - Live updates out, session events in; closing ends the session

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::advice::{advise, Advice, AdviceCache, AdviceGenerator, CacheStats, FallbackAdvisor};
use crate::core::session::{Session, SessionStatus, SessionStore, SessionUpdate};
use crate::error::PipelineError;
use crate::types::{Context, EmotionSample, EventOutcome, Interval, SessionEvent, TriggerDecision};

/// App state
pub struct AppState {
    pub sessions: SessionStore,
    pub advice_cache: Mutex<AdviceCache>,
    pub generator: Arc<dyn AdviceGenerator>,
}

/// Create new session response
#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct WordRequest {
    pub text: String,
    pub timestamp: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct SegmentRequest {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct TickRequest {
    pub now: f64,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub interval: Interval,
    pub now: f64,
}

/// Result of feeding one event
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub interval: Option<Interval>,
    pub trigger: Option<TriggerDecision>,
    pub context: Option<Context>,
    pub advice: Option<Advice>,
}

/// Create the API router with rule-based advice
pub fn create_router(config: &AppConfig) -> Router {
    create_router_with(config, Arc::new(FallbackAdvisor::new()))
}

/// Create the API router with an injected advice generator
pub fn create_router_with(config: &AppConfig, generator: Arc<dyn AdviceGenerator>) -> Router {
    let state = Arc::new(AppState {
        sessions: SessionStore::new(config.pipeline.clone(), config.server.max_sessions),
        advice_cache: Mutex::new(AdviceCache::from_config(&config.server)),
        generator,
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/reset", post(reset_session))
        .route("/session/:id/sample", post(add_sample))
        .route("/session/:id/word", post(add_word))
        .route("/session/:id/segment", post(add_segment))
        .route("/session/:id/tick", post(tick))
        .route("/session/:id/interval", post(ingest_interval))
        .route("/session/:id/context", get(get_context))
        .route("/session/:id/context/text", get(get_context_text))
        .route("/cache/stats", get(cache_stats))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

fn error_status(e: PipelineError) -> StatusCode {
    let status = match &e {
        PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::SessionLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::InvalidInterval { .. } | PipelineError::OutOfOrderInterval { .. } => {
            StatusCode::CONFLICT
        }
        PipelineError::Advice(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = status.as_u16(), error = %e, "request failed");
    status
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: state.sessions.len().await,
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NewSessionResponse>, StatusCode> {
    let (session_id, _) = state.sessions.create().await.map_err(error_status)?;

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
    }))
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, StatusCode> {
    let session = state.sessions.get(&id).await.map_err(error_status)?;
    let status = session.lock().await.status();
    Ok(Json(status))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state.sessions.destroy(&id).await.map_err(error_status)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, StatusCode> {
    let session = state.sessions.get(&id).await.map_err(error_status)?;
    let mut session = session.lock().await;
    session.session_reset();
    session.publish(SessionUpdate::Reset {
        reason: "requested".to_string(),
    });
    Ok(Json(session.status()))
}

async fn add_sample(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(sample): Json<EmotionSample>,
) -> Result<Json<EventResponse>, StatusCode> {
    feed(&state, &id, SessionEvent::Sample(sample)).await
}

async fn add_word(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<WordRequest>,
) -> Result<Json<EventResponse>, StatusCode> {
    let event = SessionEvent::Word {
        text: req.text,
        timestamp: req.timestamp,
        confidence: req.confidence,
    };
    feed(&state, &id, event).await
}

async fn add_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SegmentRequest>,
) -> Result<Json<EventResponse>, StatusCode> {
    let event = SessionEvent::Segment {
        text: req.text,
        start: req.start,
        end: req.end,
        confidence: req.confidence,
    };
    feed(&state, &id, event).await
}

async fn tick(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TickRequest>,
) -> Result<Json<EventResponse>, StatusCode> {
    feed(&state, &id, SessionEvent::Tick { now: req.now }).await
}

/// Apply one event, then advise if it fired a trigger
async fn feed(state: &AppState, id: &str, event: SessionEvent) -> Result<Json<EventResponse>, StatusCode> {
    let session = state.sessions.get(id).await.map_err(error_status)?;
    let response = process_event(state, &session, event).await.map_err(error_status)?;
    Ok(Json(response))
}

async fn process_event(
    state: &AppState,
    session: &Mutex<Session>,
    event: SessionEvent,
) -> Result<EventResponse, PipelineError> {
    // Session lock is not held across the advice call
    let (outcome, rendered) = {
        let mut session = session.lock().await;
        let outcome: EventOutcome = session.handle_event(event)?;
        let rendered = outcome.context.as_ref().map(|c| session.render_context(c));
        (outcome, rendered)
    };

    let advice = match (&outcome.context, rendered) {
        (Some(context), Some(rendered)) => {
            let advice = advise(state.generator.as_ref(), &state.advice_cache, context, &rendered).await;
            session.lock().await.publish(SessionUpdate::Advice {
                advice: advice.clone(),
            });
            Some(advice)
        }
        _ => None,
    };

    Ok(EventResponse {
        interval: outcome.interval,
        trigger: outcome.trigger,
        context: outcome.context,
        advice,
    })
}

/// Ingest an interval closed outside this service
async fn ingest_interval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<EventResponse>, StatusCode> {
    let event = SessionEvent::Interval {
        interval: req.interval,
        now: req.now,
    };
    feed(&state, &id, event).await
}

async fn get_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Context>, StatusCode> {
    let session = state.sessions.get(&id).await.map_err(error_status)?;
    let context = session.lock().await.build_context();
    Ok(Json(context))
}

async fn get_context_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let session = state.sessions.get(&id).await.map_err(error_status)?;
    let session = session.lock().await;
    let text = session.render_context(&session.build_context());
    Ok((StatusCode::OK, [("content-type", "text/plain; charset=utf-8")], text))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.advice_cache.lock().await.stats())
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let session = state.sessions.get(&id).await.map_err(error_status)?;
    let rx = session.lock().await.subscribe();

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, state, id, session, rx).await;
    }))
}

/// Forward updates to the client; apply events the client sends
///
/// The session lives as long as its socket: closing it destroys the session.
async fn handle_websocket(
    socket: WebSocket,
    state: Arc<AppState>,
    id: String,
    session: Arc<Mutex<Session>>,
    mut rx: broadcast::Receiver<SessionUpdate>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    info!(session = %id, "websocket connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    let json = serde_json::to_string(&update).unwrap_or_default();
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<SessionEvent>(&text) {
                Ok(event) => {
                    if let Err(e) = process_event(&state, &session, event).await {
                        warn!(error = %e, "websocket event rejected");
                    }
                }
                Err(e) => warn!(error = %e, "unparseable websocket event"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    if let Err(e) = state.sessions.destroy(&id).await {
        debug!(session = %id, error = %e, "session already gone");
    }
    info!(session = %id, "websocket closed");
}

/// Run the API server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(&config);
    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    info!(addr = %config.server.addr, "Coachline API listening");
    println!("Coachline API running on {}", config.server.addr);
    println!("  POST   /session/new              - Create session");
    println!("  GET    /session/:id              - Session status");
    println!("  DELETE /session/:id              - Destroy session");
    println!("  POST   /session/:id/reset        - Reset session");
    println!("  POST   /session/:id/sample       - Feed emotion sample");
    println!("  POST   /session/:id/word         - Feed word");
    println!("  POST   /session/:id/segment      - Feed transcript segment");
    println!("  POST   /session/:id/tick         - Clock tick");
    println!("  POST   /session/:id/interval     - Ingest closed interval");
    println!("  GET    /session/:id/context      - Context (JSON)");
    println!("  GET    /session/:id/context/text - Context (text)");
    println!("  GET    /cache/stats              - Advice cache stats");
    println!("  WS     /ws/:id                   - Live updates");
    println!("  GET    /health                   - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
