//! Delivery of node-to-node requests to a peer's `/remote` endpoint.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use shared::error::ApiError;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("unknown remote node {0}")]
    UnknownNode(String),
    #[error("remote node {node} is unreachable: {reason}")]
    Unreachable { node: String, reason: String },
    #[error("remote node {node} rejected the request: {reason}")]
    Rejected { node: String, reason: String },
}

#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn post_remote(&self, node: &str, body: serde_json::Value) -> Result<(), PeerError>;
}

pub struct HttpPeerLink {
    http: Client,
    remote_urls: BTreeMap<String, Url>,
}

impl HttpPeerLink {
    pub fn new(peers: &BTreeMap<String, String>) -> anyhow::Result<Self> {
        let mut remote_urls = BTreeMap::new();
        for (node, base) in peers {
            let base = Url::parse(base)
                .with_context(|| format!("invalid url '{base}' for peer {node}"))?;
            remote_urls.insert(node.clone(), base.join("/remote")?);
        }
        Ok(Self {
            http: Client::new(),
            remote_urls,
        })
    }
}

#[async_trait]
impl PeerLink for HttpPeerLink {
    async fn post_remote(&self, node: &str, body: serde_json::Value) -> Result<(), PeerError> {
        let url = self
            .remote_urls
            .get(node)
            .ok_or_else(|| PeerError::UnknownNode(node.to_string()))?;
        debug!(node, %url, "forwarding request to peer");

        let response = self
            .http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| PeerError::Unreachable {
                node: node.to_string(),
                reason: err.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<ApiError>(&text) {
            Ok(api_error) => api_error.message,
            Err(_) if text.trim().is_empty() => format!("HTTP {}", status.as_u16()),
            Err(_) => text,
        };
        Err(PeerError::Rejected {
            node: node.to_string(),
            reason,
        })
    }
}
