//! Remote agent: a bidirectional call bridge into a live browser page
//!
//! This library injects a command namespace into a page reached over the
//! Chrome DevTools Protocol, calls functions on it, proxies marked DOM
//! elements, and relays page-side attribute events back to the host.

pub mod error;
pub mod config;

pub mod cdp;
pub mod bridge;

// Re-exports
pub use bridge::{BridgeOptions, CallArg, PendingLoad, RemoteAgent, RemoteElement};
pub use error::{Error, Result};

/// Remote agent library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
