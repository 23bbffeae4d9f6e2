//! CDP browser discovery implementation
//!
//! This module talks to the DevTools HTTP endpoint to find debuggable page
//! targets and attaches clients to them.

use super::client::CdpClientImpl;
use super::connection::{CdpTimeoutConfig, CdpWebSocketConnection};
use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// DevTools HTTP endpoint (e.g., "http://localhost:9222")
    endpoint: String,
    /// Timeouts for attached connections
    timeout_config: CdpTimeoutConfig,
    /// HTTP client
    http: reqwest::Client,
}

impl CdpBrowserImpl {
    /// Create a new browser handle
    ///
    /// # Arguments
    /// * `endpoint` - DevTools endpoint; `ws://` schemes are accepted and mapped to HTTP
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self::with_timeouts(endpoint, CdpTimeoutConfig::default())
    }

    /// Create a browser handle whose connections use `timeout_config`
    pub fn with_timeouts<S: Into<String>>(endpoint: S, timeout_config: CdpTimeoutConfig) -> Self {
        let endpoint = endpoint
            .into()
            .replace("ws://", "http://")
            .replace("wss://", "https://")
            .trim_end_matches('/')
            .to_string();
        info!("Creating CDP browser handle for endpoint: {}", endpoint);

        Self {
            endpoint,
            timeout_config,
            http: reqwest::Client::new(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, Error> {
        let url = format!("{}{}", self.endpoint, path);
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::cdp(format!("Failed to reach {}: {}", url, e)))?;

        response
            .json()
            .await
            .map_err(|e| Error::cdp(format!("Failed to parse {}: {}", url, e)))
    }

    /// Pick the first page target whose URL contains `url_filter` (any page when `None`)
    pub async fn find_page(&self, url_filter: Option<&str>) -> Result<TargetInfo, Error> {
        let targets = self.get_targets().await?;
        select_page(targets, url_filter).ok_or_else(|| match url_filter {
            Some(filter) => Error::cdp(format!("No debuggable page matching '{}'", filter)),
            None => Error::cdp("No debuggable page found"),
        })
    }
}

/// Parse the `/json/list` payload
pub(crate) fn parse_targets(targets_json: &[serde_json::Value]) -> Vec<TargetInfo> {
    let text = |v: &serde_json::Value, key: &str| v.get(key).and_then(|s| s.as_str()).map(str::to_string);

    targets_json
        .iter()
        .filter_map(|target| {
            Some(TargetInfo {
                target_id: text(target, "id")?,
                target_type: text(target, "type")?,
                url: text(target, "url")?,
                title: text(target, "title").unwrap_or_default(),
                web_socket_debugger_url: text(target, "webSocketDebuggerUrl"),
            })
        })
        .collect()
}

fn select_page(targets: Vec<TargetInfo>, url_filter: Option<&str>) -> Option<TargetInfo> {
    targets.into_iter().find(|t| {
        t.target_type == "page"
            && t.web_socket_debugger_url.is_some()
            && url_filter.map_or(true, |filter| t.url.contains(filter))
    })
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    async fn create_client(&self, target_ws_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        info!("Creating CDP client for target: {}", target_ws_url);

        let connection = CdpWebSocketConnection::with_timeouts(target_ws_url, self.timeout_config.clone()).await?;
        Ok(Arc::new(CdpClientImpl::new(connection)))
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        let version = self.get_json("/json/version").await?;
        let field = |key: &str| {
            version
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        Ok(BrowserVersion {
            protocol_version: field("Protocol-Version"),
            product: field("Browser"),
            user_agent: field("User-Agent"),
        })
    }

    async fn get_targets(&self) -> Result<Vec<TargetInfo>, Error> {
        let list = self.get_json("/json/list").await?;
        let entries = list
            .as_array()
            .ok_or_else(|| Error::cdp("Target list is not an array"))?;

        Ok(parse_targets(entries))
    }
}
