//! Node Fetcher: pulls the current node list from the monitoring API.
//!
//! One authenticated GET per run with a hard 5-second bound. Every
//! failure is classified and logged with full context before it
//! propagates; the caller treats all of them as fatal.

use crate::config::{ApiConfig, FETCH_TIMEOUT_SECS};
use crate::error::FetchError;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

/// One monitored device as the API reports it.
///
/// Only `NodeID` is required, and even that is kept raw here: the API
/// has been seen emitting it as a number or a numeric string, so the
/// translator does the coercion per record instead of failing the whole
/// fetch at decode time.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "NodeID", default)]
    pub node_id: Option<serde_json::Value>,
    #[serde(rename = "Caption", default)]
    pub caption: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "Vendor", default)]
    pub vendor: Option<String>,
    #[serde(rename = "NodeIP", default)]
    pub node_ip: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Source of node records. Seam for orchestrator tests.
pub trait NodeSource {
    fn fetch_nodes(&self) -> impl Future<Output = Result<Vec<NodeRecord>, FetchError>> + Send;
}

pub struct NodeFetcher {
    client: Client,
    config: ApiConfig,
}

impl NodeFetcher {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, config })
    }
}

impl NodeSource for NodeFetcher {
    async fn fetch_nodes(&self) -> Result<Vec<NodeRecord>, FetchError> {
        debug!("Fetching node list from {}", self.config.url);

        let result = self.request().await;
        if let Err(ref e) = result {
            error!("Failed to fetch nodes from {}: {}", self.config.url, e);
        }
        result
    }
}

impl NodeFetcher {
    async fn request(&self) -> Result<Vec<NodeRecord>, FetchError> {
        let response = self
            .client
            .get(&self.config.url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Auth);
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedResponse {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        if !body.is_array() {
            return Err(FetchError::MalformedPayload {
                detail: format!("expected a JSON array, got {}", json_kind(&body)),
            });
        }

        let nodes: Vec<NodeRecord> =
            serde_json::from_value(body).map_err(|e| FetchError::MalformedPayload {
                detail: e.to_string(),
            })?;

        debug!("Fetched {} node record(s)", nodes.len());
        Ok(nodes)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
