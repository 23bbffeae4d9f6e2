//! CDP (Chrome DevTools Protocol) layer traits
//!
//! This module defines the abstract interfaces for CDP communication.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::types::{CallArgument, ObjectHandle, RemoteObject, RuntimeResponse};

/// CDP event representation
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    pub params: Value,
    /// Session ID (for multi-session targets)
    pub session_id: Option<String>,
}

impl CdpEvent {
    /// Create an event without session
    pub fn new<S: Into<String>>(method: S, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            session_id: None,
        }
    }
}

/// CDP response representation
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    pub result: Option<Value>,
    /// Error if any
    pub error: Option<CdpError>,
}

/// CDP error representation
#[derive(Debug, Clone)]
pub struct CdpError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    pub data: Option<Value>,
}

impl From<CdpError> for crate::Error {
    fn from(err: CdpError) -> Self {
        crate::Error::cdp_response(err.message, err.code, err.data)
    }
}

/// CDP connection trait
///
/// Represents a WebSocket connection to a Chrome DevTools Protocol target.
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send a CDP command and wait for response
    async fn send_command(
        &self,
        method: &str,
        params: Value,
    ) -> Result<CdpResponse, crate::Error>;

    /// Subscribe to CDP events
    async fn listen_events(&self) -> Result<tokio::sync::mpsc::Receiver<CdpEvent>, crate::Error>;

    /// Close the connection
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if connection is active
    fn is_active(&self) -> bool;
}

/// Options for `Runtime.evaluate`
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    /// Serialize the result instead of returning a handle
    pub return_by_value: bool,
    /// Await the result if it is a promise
    pub await_promise: bool,
}

/// CDP client trait
///
/// High-level client exposing the Runtime/DOM operations the agent needs.
/// Runtime operations return the raw [`RuntimeResponse`] so callers can tell
/// a transport failure (`Err`) from a remote exception (`threw()`).
#[async_trait]
pub trait CdpClient: Send + Sync + std::fmt::Debug {
    /// Get the underlying connection
    fn connection(&self) -> Arc<dyn CdpConnection>;

    /// Evaluate an expression in the page's main world
    async fn evaluate(&self, expression: &str, options: EvaluateOptions) -> Result<RuntimeResponse, crate::Error>;

    /// Call a function with `this` bound to a remote object
    async fn call_function_on(
        &self,
        target: &ObjectHandle,
        function_declaration: &str,
        arguments: Vec<CallArgument>,
    ) -> Result<RuntimeResponse, crate::Error>;

    /// Resolve a DOM node id to its JavaScript object wrapper
    async fn resolve_node(&self, node_id: i64) -> Result<RemoteObject, crate::Error>;

    /// Enable a domain
    async fn enable_domain(&self, domain: &str) -> Result<(), crate::Error>;

    /// Call a raw CDP method (returns JSON Value)
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, crate::Error>;

    /// Subscribe to events whose method is in `event_types` (all events when empty)
    async fn subscribe_events(&self, event_types: &[&str]) -> Result<tokio::sync::mpsc::Receiver<CdpEvent>, crate::Error>;
}

/// Browser version information
#[derive(Debug, Clone)]
pub struct BrowserVersion {
    /// Protocol version
    pub protocol_version: String,
    /// Product name
    pub product: String,
    /// User agent
    pub user_agent: String,
}

/// Target information (page, worker, etc.)
#[derive(Debug, Clone)]
pub struct TargetInfo {
    /// Target ID
    pub target_id: String,
    /// Target type
    pub target_type: String,
    /// Target title
    pub title: String,
    /// Target URL
    pub url: String,
    /// WebSocket URL to attach a debugger to
    pub web_socket_debugger_url: Option<String>,
}

/// CDP browser trait
///
/// Discovers debuggable targets and attaches clients to them.
#[async_trait]
pub trait CdpBrowser: Send + Sync + std::fmt::Debug {
    /// Create a new CDP client attached to a target WebSocket URL
    async fn create_client(&self, target_ws_url: &str) -> Result<Arc<dyn CdpClient>, crate::Error>;

    /// Get browser version
    async fn get_version(&self) -> Result<BrowserVersion, crate::Error>;

    /// List all targets (pages, workers, etc.)
    async fn get_targets(&self) -> Result<Vec<TargetInfo>, crate::Error>;
}
