//! HTTP binding of [`RemoteClient`] and [`RawRequester`] against a node's
//! `/api` endpoint.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::CounterSnapshot,
    protocol::{ApiRequest, ApiResult},
};
use tracing::{debug, warn};
use url::Url;

use crate::{config::ClientSettings, error::RemoteFailure, RawRequester, RemoteClient};

/// Status and body of a `/api` response, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct HttpRemoteClient {
    http: Client,
    api_url: Url,
    identity_url: Url,
}

impl HttpRemoteClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_http(server_url, Client::new())
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build http client")?;
        Self::with_http(&settings.server_url, http)
    }

    fn with_http(server_url: &str, http: Client) -> Result<Self> {
        let base = Url::parse(server_url.trim())
            .with_context(|| format!("invalid node url '{server_url}'"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("node url '{server_url}' cannot be used as a base url"));
        }
        Ok(Self {
            http,
            api_url: base.join("/api")?,
            identity_url: base.join("/our")?,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Asks the node which identity it runs as. `None` when the node is
    /// unreachable or answers with an empty name.
    pub async fn resolve_node_identity(&self) -> Option<String> {
        let response = match self.http.get(self.identity_url.clone()).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(url = %self.identity_url, %error, "node identity lookup failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(url = %self.identity_url, status = %response.status(), "node identity lookup rejected");
            return None;
        }
        let node = response.text().await.ok()?.trim().to_string();
        (!node.is_empty()).then_some(node)
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn call(&self, operation: &str, payload: String) -> Result<CounterSnapshot> {
        let request = ApiRequest::from_operation(operation, payload)
            .ok_or_else(|| anyhow!("unsupported node operation `{operation}`"))?;
        debug!(operation, url = %self.api_url, "calling node api");

        let response = self
            .http
            .post(self.api_url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("failed to reach node api at {}", self.api_url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read node api response")?;

        if !status.is_success() {
            warn!(operation, %status, "node api rejected request");
            let mut failure = RemoteFailure::new(format!(
                "HTTP request failed with status {}",
                status.as_u16()
            ));
            if !body.trim().is_empty() {
                failure = failure.with_details(body);
            }
            return Err(failure.into());
        }

        let outcome: ApiResult = serde_json::from_str(&body)
            .with_context(|| format!("unexpected response body for {operation}"))?;
        outcome.map_err(|detail| {
            RemoteFailure::new(format!("{operation} failed"))
                .with_details(detail)
                .into()
        })
    }
}

#[async_trait]
impl RawRequester for HttpRemoteClient {
    async fn post_api(&self, body: serde_json::Value) -> Result<RawResponse> {
        debug!(url = %self.api_url, "posting raw node api request");
        let response = self
            .http
            .post(self.api_url.clone())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach node api at {}", self.api_url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("failed to read node api response")?;
        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
