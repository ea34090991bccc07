//! Orchestration store: per-flow input fields, busy locks and one error slot
//! layered over the node's shared counter snapshot.
//!
//! Commands never return errors. Every outcome is written into the
//! [`StoreView`] and announced as a [`StoreEvent`], so a renderer only has to
//! observe state. Different flows may be awaited concurrently; whichever
//! snapshot write resolves last wins.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde::Serialize;
use shared::{
    domain::{CounterSnapshot, SendMode},
    protocol::{operation, MismatchRequest, PingRequest, SendMessageRequest},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::describe_failure, transport::RawResponse, HttpRemoteClient, IdentityProvider,
    RawRequester, RemoteClient,
};

pub const NOT_CONNECTED_MESSAGE: &str = "Not connected to a Hyperware node.";
pub const PING_MESSAGE_REQUIRED: &str = "Enter a message before sending a ping.";
pub const MESSAGE_REQUIRED: &str = "Enter a message before sending.";
pub const REMOTE_NODE_REQUIRED: &str = "Specify a remote node before sending.";
pub const MISMATCH_NODE_REQUIRED: &str = "Enter the remote node to target.";
pub const MISMATCH_MESSAGE_REQUIRED: &str = "Enter a message before triggering the mismatch.";
/// Sent by the mismatch-via-ping flow when the ping field is blank. That flow
/// never blocks on empty input.
pub const HTTP_MISMATCH_DEFAULT_MESSAGE: &str = "mismatch-trigger";

/// `get_counters` takes a JSON-encoded empty string.
const EMPTY_PAYLOAD: &str = "\"\"";
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Refresh,
    Ping,
    HttpMismatch,
    Dispatch,
    Mismatch,
}

impl Flow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Ping => "ping",
            Self::HttpMismatch => "http_mismatch",
            Self::Dispatch => "dispatch",
            Self::Mismatch => "mismatch",
        }
    }
}

/// Busy flag per flow; true from invocation until the flow's terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlowLocks {
    pub refresh: bool,
    pub ping: bool,
    pub http_mismatch: bool,
    pub dispatch: bool,
    pub mismatch: bool,
}

impl FlowLocks {
    pub fn is_locked(&self, flow: Flow) -> bool {
        match flow {
            Flow::Refresh => self.refresh,
            Flow::Ping => self.ping,
            Flow::HttpMismatch => self.http_mismatch,
            Flow::Dispatch => self.dispatch,
            Flow::Mismatch => self.mismatch,
        }
    }

    pub fn any(&self) -> bool {
        self.refresh || self.ping || self.http_mismatch || self.dispatch || self.mismatch
    }

    fn set(&mut self, flow: Flow, locked: bool) {
        let slot = match flow {
            Flow::Refresh => &mut self.refresh,
            Flow::Ping => &mut self.ping,
            Flow::HttpMismatch => &mut self.http_mismatch,
            Flow::Dispatch => &mut self.dispatch,
            Flow::Mismatch => &mut self.mismatch,
        };
        *slot = locked;
    }
}

/// Everything a renderer needs, cloned out of the store in one piece.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreView {
    pub node_id: Option<String>,
    pub is_connected: bool,
    pub counters: Option<CounterSnapshot>,
    pub http_message: String,
    pub process_message: String,
    pub send_mode: SendMode,
    pub remote_node: String,
    pub mismatch_node: String,
    pub mismatch_message: String,
    pub locks: FlowLocks,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StoreEvent {
    Changed(StoreView),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorPolicy {
    Clear,
    Keep,
}

pub struct CounterStore {
    remote: Arc<dyn RemoteClient>,
    raw: Arc<dyn RawRequester>,
    identity: Arc<dyn IdentityProvider>,
    state: Mutex<StoreView>,
    events: broadcast::Sender<StoreEvent>,
}

impl CounterStore {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        raw: Arc<dyn RawRequester>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            remote,
            raw,
            identity,
            state: Mutex::new(StoreView::default()),
            events,
        }
    }

    /// Store whose remote calls and raw requests share one HTTP binding.
    pub fn over_http(client: Arc<HttpRemoteClient>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::new(client.clone(), client, identity)
    }

    pub fn view(&self) -> StoreView {
        self.lock_state().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Reads the identity once. Without one the store reports itself
    /// disconnected and never contacts the node.
    pub async fn initialize(&self) {
        let node_id = self.identity.current_identity();
        let connected = node_id.is_some();
        self.update(|state| {
            state.node_id = node_id.clone();
            state.is_connected = connected;
            if !connected {
                state.error = Some(NOT_CONNECTED_MESSAGE.to_string());
            }
        });

        match node_id {
            Some(node) => {
                info!(%node, "connected to node");
                self.refresh().await;
            }
            None => warn!("no node identity available; skipping initial refresh"),
        }
    }

    pub async fn refresh(&self) {
        self.resync(ErrorPolicy::Clear).await;
    }

    pub async fn send_ping(&self) {
        let message = self.lock_state().http_message.trim().to_string();
        if message.is_empty() {
            self.reject(Flow::Ping, PING_MESSAGE_REQUIRED);
            return;
        }

        self.acquire(Flow::Ping, ErrorPolicy::Clear);
        match self
            .call_json(operation::PING_HTTP, &PingRequest { message })
            .await
        {
            Ok(snapshot) => self.update(|state| {
                state.counters = Some(snapshot);
                state.http_message.clear();
                state.locks.set(Flow::Ping, false);
            }),
            Err(error) => self.fail(Flow::Ping, &error),
        }
    }

    /// Posts a `PingLocal` body to `/api`, which only understands the HTTP
    /// variants, and surfaces whatever the node answers. The snapshot is
    /// re-read afterwards even when the node rejected the request; a
    /// transport failure skips that re-read.
    pub async fn trigger_http_mismatch(&self) {
        let message = {
            let typed = self.lock_state().http_message.trim().to_string();
            if typed.is_empty() {
                HTTP_MISMATCH_DEFAULT_MESSAGE.to_string()
            } else {
                typed
            }
        };

        self.acquire(Flow::HttpMismatch, ErrorPolicy::Clear);
        match self.post_mismatch(message).await {
            Ok(response) if response.is_success() => {
                self.release(Flow::HttpMismatch);
                self.refresh().await;
            }
            Ok(response) => {
                warn!(status = response.status, "node rejected mismatched ping");
                let detail = if response.body.trim().is_empty() {
                    format!("HTTP {}", response.status)
                } else {
                    response.body
                };
                self.update(|state| {
                    state.error = Some(detail);
                    state.locks.set(Flow::HttpMismatch, false);
                });
                self.resync(ErrorPolicy::Keep).await;
            }
            Err(error) => self.fail(Flow::HttpMismatch, &error),
        }
    }

    /// Dispatches the process message in the selected mode, then re-reads the
    /// counters instead of trusting the dispatch response.
    pub async fn send_message(&self) {
        let (mode, message, target) = {
            let state = self.lock_state();
            (
                state.send_mode,
                state.process_message.trim().to_string(),
                state.remote_node.trim().to_string(),
            )
        };
        if message.is_empty() {
            self.reject(Flow::Dispatch, MESSAGE_REQUIRED);
            return;
        }
        // Only plain remote sends are checked here; a remote-mismatch dispatch
        // goes out without a target and the node reports what is missing.
        let target_node = if mode == SendMode::Remote {
            if target.is_empty() {
                self.reject(Flow::Dispatch, REMOTE_NODE_REQUIRED);
                return;
            }
            Some(target)
        } else {
            None
        };

        self.acquire(Flow::Dispatch, ErrorPolicy::Clear);
        let request = SendMessageRequest {
            mode,
            message,
            target_node,
        };
        match self.call_json(operation::SEND_MESSAGE, &request).await {
            Ok(_) => {
                self.update(|state| {
                    state.process_message.clear();
                    state.locks.set(Flow::Dispatch, false);
                });
                self.refresh().await;
            }
            Err(error) => self.fail(Flow::Dispatch, &error),
        }
    }

    /// Asks the node to forward a wrongly shaped request to `mismatch_node`.
    /// The expected outcome is an error, so no refresh follows.
    pub async fn trigger_mismatch(&self) {
        let (target, message) = {
            let state = self.lock_state();
            (
                state.mismatch_node.trim().to_string(),
                state.mismatch_message.trim().to_string(),
            )
        };
        if target.is_empty() {
            self.reject(Flow::Mismatch, MISMATCH_NODE_REQUIRED);
            return;
        }
        if message.is_empty() {
            self.reject(Flow::Mismatch, MISMATCH_MESSAGE_REQUIRED);
            return;
        }

        self.acquire(Flow::Mismatch, ErrorPolicy::Clear);
        let request = SendMessageRequest {
            mode: SendMode::RemoteMismatch,
            message,
            target_node: Some(target),
        };
        match self.call_json(operation::SEND_MESSAGE, &request).await {
            Ok(_) => self.update(|state| {
                state.mismatch_message.clear();
                state.locks.set(Flow::Mismatch, false);
            }),
            Err(error) => self.fail(Flow::Mismatch, &error),
        }
    }

    pub fn dismiss_error(&self) {
        self.update(|state| state.error = None);
    }

    pub fn set_http_message(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.http_message = value);
    }

    pub fn set_process_message(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.process_message = value);
    }

    pub fn set_send_mode(&self, mode: SendMode) {
        self.update(|state| state.send_mode = mode);
    }

    pub fn set_remote_node(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.remote_node = value);
    }

    pub fn set_mismatch_node(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.mismatch_node = value);
    }

    pub fn set_mismatch_message(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.mismatch_message = value);
    }

    async fn resync(&self, policy: ErrorPolicy) {
        self.acquire(Flow::Refresh, policy);
        match self
            .remote
            .call(operation::GET_COUNTERS, EMPTY_PAYLOAD.to_string())
            .await
        {
            Ok(snapshot) => self.update(|state| {
                state.counters = Some(snapshot);
                state.locks.set(Flow::Refresh, false);
            }),
            Err(error) => self.fail(Flow::Refresh, &error),
        }
    }

    async fn call_json<T: Serialize + Sync>(
        &self,
        operation: &str,
        request: &T,
    ) -> Result<CounterSnapshot> {
        let payload = serde_json::to_string(request)
            .with_context(|| format!("failed to encode {operation} request"))?;
        self.remote.call(operation, payload).await
    }

    async fn post_mismatch(&self, message: String) -> Result<RawResponse> {
        let body = serde_json::to_value(MismatchRequest::PingLocal(message))
            .context("failed to encode mismatched ping")?;
        self.raw.post_api(body).await
    }

    fn acquire(&self, flow: Flow, policy: ErrorPolicy) {
        self.update(|state| {
            // Callers gate triggers on the lock; a second invocation still runs.
            if state.locks.is_locked(flow) {
                warn!(
                    flow = flow.as_str(),
                    "flow invoked while its previous request is outstanding"
                );
            }
            state.locks.set(flow, true);
            if policy == ErrorPolicy::Clear {
                state.error = None;
            }
        });
        debug!(flow = flow.as_str(), "flow started");
    }

    fn release(&self, flow: Flow) {
        self.update(|state| state.locks.set(flow, false));
    }

    fn reject(&self, flow: Flow, message: &str) {
        debug!(flow = flow.as_str(), message, "flow input rejected");
        self.update(|state| state.error = Some(message.to_string()));
    }

    fn fail(&self, flow: Flow, error: &anyhow::Error) {
        let message = describe_failure(error);
        warn!(flow = flow.as_str(), error = %message, "flow failed");
        self.update(|state| {
            state.error = Some(message);
            state.locks.set(flow, false);
        });
    }

    fn update<R>(&self, apply: impl FnOnce(&mut StoreView) -> R) -> R {
        let (result, view) = {
            let mut state = self.lock_state();
            let result = apply(&mut state);
            (result, state.clone())
        };
        let _ = self.events.send(StoreEvent::Changed(view));
        result
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreView> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
