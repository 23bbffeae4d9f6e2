//! # Chrome DevTools Protocol (CDP) layer
//!
//! The transport the agent is built on, reduced to the operations it needs:
//! evaluating expressions, calling functions on remote objects, resolving DOM
//! nodes, and listening for page/DOM notifications.
//!
//! ## Module structure
//! - `traits`: connection, client and browser traits
//! - `types`: protocol data types
//! - `connection`: WebSocket connection
//! - `client`: typed client on top of a connection
//! - `browser`: target discovery over the DevTools HTTP endpoint
//! - `mock`: scriptable connection for tests
//!
//! ## Example
//! ```rust,no_run
//! use remote_agent::cdp::{CdpBrowser, CdpBrowserImpl, EvaluateOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = CdpBrowserImpl::new("http://localhost:9222");
//! let page = browser.find_page(None).await?;
//! let client = browser
//!     .create_client(page.web_socket_debugger_url.as_deref().unwrap_or_default())
//!     .await?;
//!
//! let response = client.evaluate("document.title", EvaluateOptions::default()).await?;
//! println!("Title: {:?}", response.result.value);
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;

pub use traits::{
    BrowserVersion, CdpBrowser, CdpClient, CdpConnection, CdpError, CdpEvent, CdpResponse,
    EvaluateOptions, TargetInfo,
};
pub use types::{
    AttributeModified, CallArgument, ObjectHandle, RemoteObject, RuntimeResponse,
    ATTRIBUTE_MODIFIED, FRAME_STARTED_LOADING, LOAD_EVENT_FIRED,
};

// Re-export implementation structs
pub use connection::{CdpTimeoutConfig, CdpWebSocketConnection};
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;

// Re-export mock for development/testing
pub use mock::{MockCdpConnection, MockResponse, RecordedCommand};
