//! # Remote agent
//!
//! Attaches to a page of a running browser, loads the remote agent into it and
//! logs the events the page relays until interrupted.
//!
//! ## Environment variables
//! - `REMOTE_AGENT_CDP_ENDPOINT`: DevTools HTTP endpoint (default: http://localhost:9222)
//! - `REMOTE_AGENT_TARGET_URL`: substring of the page URL to attach to
//! - `REMOTE_AGENT_EXPERIMENTAL`: flag handed to the injected functions
//! - `REMOTE_AGENT_REMOTE_FUNCTIONS` / `REMOTE_AGENT_LIBRARY`: payload files
//! - `RUST_LOG`: log level, overriding `REMOTE_AGENT_LOG_LEVEL`

use anyhow::Context;
use futures::StreamExt;
use remote_agent::{
    bridge::{BridgeOptions, Payloads, RemoteAgent},
    cdp::{CdpBrowser, CdpBrowserImpl, CdpClient, CdpConnection, CdpTimeoutConfig},
    config::Config,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .or_else(|| config.log_level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config)?;

    info!("Remote agent v{}", remote_agent::VERSION);
    info!("Configuration loaded: endpoint={}", config.cdp_endpoint);

    let browser = CdpBrowserImpl::with_timeouts(&config.cdp_endpoint, CdpTimeoutConfig::uniform(config.command_timeout()));

    let version = browser
        .get_version()
        .await
        .with_context(|| format!("Browser not reachable at {}", config.cdp_endpoint))?;
    info!("Connected to {} (protocol {})", version.product, version.protocol_version);

    let page = browser
        .find_page(config.target_url.as_deref())
        .await
        .context("No page target to attach to")?;
    info!("Attaching to page {} ({})", page.target_id, page.url);

    let ws_url = page
        .web_socket_debugger_url
        .as_deref()
        .context("Page target has no debugger URL")?;
    let client = browser.create_client(ws_url).await.context("Failed to connect to page")?;

    for domain in ["Page", "Runtime", "DOM"] {
        client
            .enable_domain(domain)
            .await
            .with_context(|| format!("Failed to enable {} domain", domain))?;
    }

    let payloads = Payloads::from_files(config.remote_functions_path.as_deref(), config.library_path.as_deref())
        .context("Failed to read payloads")?;
    if !payloads.has_library() {
        warn!("No utility library configured; element proxies will not work");
    }

    let agent = RemoteAgent::new(client.clone(), payloads, BridgeOptions::from(&config));
    let mut events = Box::pin(agent.event_stream());

    let pending = agent.load().await.context("Failed to load remote agent")?;
    client
        .call_method("Page.reload", serde_json::json!({}))
        .await
        .context("Failed to reload page")?;

    match tokio::time::timeout(config.command_timeout(), pending).await {
        Ok(result) => {
            result.context("Remote agent injection failed")?;
            info!("Remote agent ready");
        }
        Err(_) => warn!("Page did not finish loading within {:?}; waiting for the next load", config.command_timeout()),
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => info!(
                    "Event '{}' from node {}: {}",
                    event.name, event.payload.node_id, event.payload.value
                ),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    agent.unload().await;
    if let Err(e) = client.connection().close().await {
        warn!("Failed to close connection: {}", e);
    }

    info!("Remote agent stopped");
    Ok(())
}
