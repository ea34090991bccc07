use anyhow::Result;
use async_trait::async_trait;
use shared::domain::CounterSnapshot;

pub mod config;
pub mod error;
pub mod store;
pub mod transport;

pub use error::{describe_failure, RemoteFailure, FALLBACK_ERROR_MESSAGE};
pub use store::{CounterStore, Flow, FlowLocks, StoreEvent, StoreView};
pub use transport::{HttpRemoteClient, RawResponse};

/// Executes a named node operation and resolves to the node's counters.
///
/// Failures that come from the node itself carry a [`RemoteFailure`] so the
/// store can surface the node's own detail text.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn call(&self, operation: &str, payload: String) -> Result<CounterSnapshot>;
}

/// Posts an arbitrary JSON body to the node's `/api` endpoint without
/// interpreting the response.
#[async_trait]
pub trait RawRequester: Send + Sync {
    async fn post_api(&self, body: serde_json::Value) -> Result<RawResponse>;
}

pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<String>;
}

/// Identity fixed at construction, typically resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn new(node: Option<String>) -> Self {
        Self(node.filter(|node| !node.trim().is_empty()))
    }

    pub fn disconnected() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<String> {
        self.0.clone()
    }
}
