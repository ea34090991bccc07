use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::CounterSnapshot,
    error::{ApiError, ErrorCode},
    protocol::{ApiRequest, ApiResult, RemoteRequest},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod peers;

use api::ApiContext;
use app_state::AppState;
use config::load_settings;
use peers::HttpPeerLink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let peers = HttpPeerLink::new(&settings.peers)?;
    let api = ApiContext::new(settings.node.clone(), Arc::new(peers));
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, node = %settings.node, peers = settings.peers.len(), "counter node listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/our", get(our))
        .route("/api", post(http_api))
        .route("/remote", post(http_remote))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn our(State(state): State<Arc<AppState>>) -> String {
    state.api.node.clone()
}

async fn http_api(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResult>, (StatusCode, String)> {
    let request: ApiRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!(error = %err, "rejecting malformed api request");
        (StatusCode::BAD_REQUEST, format!("invalid api request: {err}"))
    })?;
    Ok(Json(api::handle_api(&state.api, request).await))
}

async fn http_remote(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CounterSnapshot>, (StatusCode, Json<ApiError>)> {
    let request: RemoteRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!(error = %err, "rejecting unexpected remote request");
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("unexpected remote request: {err}"),
            )),
        )
    })?;
    api::receive_remote(&state.api, request)
        .await
        .map(Json)
        .map_err(|err| (StatusCode::BAD_REQUEST, Json(err)))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
