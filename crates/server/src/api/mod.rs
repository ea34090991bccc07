use std::sync::Arc;

use shared::{
    domain::{CounterSnapshot, SendMode},
    error::{ApiError, ErrorCode},
    protocol::{
        ApiRequest, ApiResult, MismatchRequest, PingRequest, RemoteRequest, SendMessageRequest,
    },
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::peers::PeerLink;

#[derive(Clone)]
pub struct ApiContext {
    pub node: String,
    pub counters: Arc<Mutex<CounterSnapshot>>,
    pub peers: Arc<dyn PeerLink>,
}

impl ApiContext {
    pub fn new(node: impl Into<String>, peers: Arc<dyn PeerLink>) -> Self {
        Self {
            node: node.into(),
            counters: Arc::new(Mutex::new(CounterSnapshot::default())),
            peers,
        }
    }
}

pub async fn handle_api(ctx: &ApiContext, request: ApiRequest) -> ApiResult {
    let operation = request.operation();
    let result = match request {
        ApiRequest::GetCounters(_) => Ok(get_counters(ctx).await),
        ApiRequest::PingHttp(body) => ping_http(ctx, &body).await,
        ApiRequest::SendMessage(body) => send_message(ctx, &body).await,
    };
    if let Err(reason) = &result {
        warn!(operation, %reason, "api request failed");
    }
    result
}

pub async fn get_counters(ctx: &ApiContext) -> CounterSnapshot {
    ctx.counters.lock().await.clone()
}

pub async fn ping_http(ctx: &ApiContext, request_body: &str) -> ApiResult {
    let request: PingRequest = serde_json::from_str(request_body)
        .map_err(|err| format!("invalid ping_http request: {err}"))?;
    let message = require_message(&request.message)?;

    let mut counters = ctx.counters.lock().await;
    counters.http_count += 1;
    counters.http_last_message = Some(message);
    Ok(counters.clone())
}

pub async fn send_message(ctx: &ApiContext, request_body: &str) -> ApiResult {
    let request: SendMessageRequest = serde_json::from_str(request_body)
        .map_err(|err| format!("invalid send_message request: {err}"))?;
    let message = require_message(&request.message)?;

    match request.mode {
        SendMode::Local => {
            let mut counters = ctx.counters.lock().await;
            counters.local_count += 1;
            counters.local_last_message = Some(message);
        }
        SendMode::Remote => {
            let target = require_target(&request)?;
            let body = encode(&RemoteRequest::Deliver {
                from: ctx.node.clone(),
                message,
            })?;
            ctx.peers
                .post_remote(target, body)
                .await
                .map_err(|err| err.to_string())?;
            info!(node = target, "delivered message to remote node");
        }
        SendMode::RemoteMismatch => {
            let target = require_target(&request)?;
            let body = encode(&MismatchRequest::PingLocal(message))?;
            ctx.peers
                .post_remote(target, body)
                .await
                .map_err(|err| err.to_string())?;
            warn!(node = target, "remote node accepted a mismatched request");
        }
    }

    Ok(get_counters(ctx).await)
}

/// Handles a request another node sent to `/remote`.
pub async fn receive_remote(
    ctx: &ApiContext,
    request: RemoteRequest,
) -> Result<CounterSnapshot, ApiError> {
    match request {
        RemoteRequest::Deliver { from, message } => {
            let message = require_message(&message)
                .map_err(|reason| ApiError::new(ErrorCode::Validation, reason))?;
            info!(%from, "received message from remote node");
            let mut counters = ctx.counters.lock().await;
            counters.remote_count += 1;
            counters.remote_last_message = Some(message);
            Ok(counters.clone())
        }
    }
}

fn require_message(message: &str) -> Result<String, String> {
    let message = message.trim();
    if message.is_empty() {
        return Err("message must not be empty".to_string());
    }
    Ok(message.to_string())
}

fn require_target(request: &SendMessageRequest) -> Result<&str, String> {
    request
        .target_node
        .as_deref()
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .ok_or_else(|| format!("mode {} requires a target node", request.mode))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|err| format!("failed to encode peer request: {err}"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
