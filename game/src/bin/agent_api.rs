use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use game::agent_api::{
    AgentApiError, AgentSession, DigestView, FramesRequest, SeekRequest, SessionSnapshot,
    SessionTimeline,
};
use game::logging::init_logging;
use game::playtest::InputAction;
use game::randomizer::OutboundEvent;
use game::settings::ConfigStore;

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<AgentSession>>,
}

impl AppState {
    /// Runs `f` with the session locked; the guard is released before any
    /// response is built.
    fn with_session<T>(&self, f: impl FnOnce(&mut AgentSession) -> T) -> T {
        let mut session = self
            .session
            .lock()
            .expect("agent api session lock should be available");
        f(&mut session)
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/state", get(agent_state))
        .route("/api/timeline", get(agent_timeline))
        .route("/api/digest", get(agent_digest))
        .route("/api/step", post(agent_step))
        .route("/api/rewind", post(agent_rewind))
        .route("/api/forward", post(agent_forward))
        .route("/api/seek", post(agent_seek))
        .route("/api/reset", post(agent_reset))
        .route("/api/outbound", get(agent_outbound))
        .with_state(state)
        .layer(cors)
}

fn resolve_agent_api_addr<F>(mut get_env: F) -> SocketAddr
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(addr) = get_env("BLOCKFIT_AGENT_API_ADDR").and_then(|v| v.parse().ok()) {
        return addr;
    }

    if let Some(port) = get_env("BLOCKFIT_AGENT_API_PORT").and_then(|v| v.parse::<u16>().ok()) {
        return SocketAddr::from(([127, 0, 0, 1], port));
    }

    SocketAddr::from(([127, 0, 0, 1], 4100))
}

fn resolve_seed<F>(mut get_env: F) -> u64
where
    F: FnMut(&str) -> Option<String>,
{
    get_env("BLOCKFIT_SEED")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn respond<T>(result: Result<T, AgentApiError>) -> ApiResult<T> {
    result
        .map(Json)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

async fn health() -> &'static str {
    "ok"
}

async fn agent_state(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    respond(state.with_session(AgentSession::state))
}

async fn agent_timeline(State(state): State<AppState>) -> Json<SessionTimeline> {
    Json(state.with_session(|session| session.timeline()))
}

async fn agent_digest(State(state): State<AppState>) -> ApiResult<DigestView> {
    respond(state.with_session(AgentSession::digest))
}

async fn agent_step(
    State(state): State<AppState>,
    Json(action): Json<InputAction>,
) -> ApiResult<SessionSnapshot> {
    respond(state.with_session(|session| session.step(action)))
}

async fn agent_rewind(
    State(state): State<AppState>,
    Json(payload): Json<FramesRequest>,
) -> ApiResult<SessionSnapshot> {
    respond(state.with_session(|session| session.rewind(payload.frames)))
}

async fn agent_forward(
    State(state): State<AppState>,
    Json(payload): Json<FramesRequest>,
) -> ApiResult<SessionSnapshot> {
    respond(state.with_session(|session| session.forward(payload.frames)))
}

async fn agent_seek(
    State(state): State<AppState>,
    Json(payload): Json<SeekRequest>,
) -> ApiResult<SessionSnapshot> {
    respond(state.with_session(|session| session.seek(payload.frame)))
}

async fn agent_reset(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    respond(state.with_session(AgentSession::reset))
}

/// Hands pending location checks and goal reports to the caller exactly once.
async fn agent_outbound(State(state): State<AppState>) -> Json<Vec<OutboundEvent>> {
    Json(state.with_session(AgentSession::drain_outbound))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info");
    let config = ConfigStore::from_env().load();
    let seed = resolve_seed(|k| env::var(k).ok());
    let state = AppState {
        session: Arc::new(Mutex::new(AgentSession::with_config(seed, config))),
    };

    let addr = resolve_agent_api_addr(|k| env::var(k).ok());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind agent api on {addr}"))?;
    println!("agent api listening on http://{addr} (seed {seed})");

    axum::serve(listener, router(state))
        .await
        .context("agent api server stopped")
}
