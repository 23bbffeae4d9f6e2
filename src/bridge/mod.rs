//! # Remote agent bridge
//!
//! Calls functions inside a live page and relays page-side events back to the
//! host, on top of the [`cdp`](crate::cdp) layer.
//!
//! ## Module structure
//! - `args`: call arguments and node reference resolution
//! - `dispatcher`: one `Runtime.callFunctionOn` per call
//! - `context`: lifecycle state and handles of the injected namespaces
//! - `heartbeat`: keep-alive timer
//! - `element`: marker-based element proxies
//! - `relay`: `data-ld-*` attribute events republished locally
//! - `payload`: injection expressions
//! - `agent`: the [`RemoteAgent`] tying it together
//!
//! ## Example
//! ```rust,no_run
//! use remote_agent::bridge::{BridgeOptions, Payloads, RemoteAgent};
//! use remote_agent::cdp::{CdpBrowser, CdpBrowserImpl};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = CdpBrowserImpl::new("http://localhost:9222");
//! let page = browser.find_page(None).await?;
//! let client = browser
//!     .create_client(page.web_socket_debugger_url.as_deref().unwrap_or_default())
//!     .await?;
//!
//! let agent = RemoteAgent::new(client, Payloads::default(), BridgeOptions::default());
//! let loaded = agent.load().await?;
//! loaded.await?;
//!
//! agent.call("keepAlive", vec![]).await?;
//! agent.remote_element("42").set_text("hi").await?;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod dispatcher;
pub mod context;
pub mod heartbeat;
pub mod element;
pub mod relay;
pub mod payload;
pub mod agent;

pub use agent::{BridgeOptions, PendingLoad, RemoteAgent};
pub use args::{CallArg, DomNode, NodeReference, ResolvedArg};
pub use context::{LifecycleState, RemoteContext};
pub use dispatcher::{Completion, Dispatcher, PendingCall};
pub use element::{ElementMethod, ProxyArg, RemoteElement, MARKER_ATTRIBUTE};
pub use heartbeat::{Heartbeat, KEEP_ALIVE_METHOD};
pub use payload::{Payloads, COMMAND_NAMESPACE, LIBRARY_NAMESPACE};
pub use relay::{EventRelay, NamedEvents, RelayedEvent, EVENT_ATTRIBUTE_PREFIX};
