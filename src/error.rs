//! Unified error types for the remote agent

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the remote agent
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors (transport failure or error response)
    #[error("CDP error: {message}")]
    Cdp {
        /// Error message
        message: String,
        /// Protocol error code, when the remote answered with one
        code: Option<i32>,
        /// Additional error data
        data: Option<serde_json::Value>,
    },

    /// An exception was thrown inside the remote runtime
    #[error("Remote exception: {text}")]
    RemoteException {
        /// Human readable exception text
        text: String,
        /// Full exception payload as reported by the remote side
        details: serde_json::Value,
    },

    /// A node reference could not be resolved to an object handle
    #[error("Node resolution failed: {0}")]
    NodeResolution(String),

    /// A pending load was dropped before injection completed
    #[error("Load abandoned: {0}")]
    LoadAbandoned(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error without protocol code
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp {
            message: msg.into(),
            code: None,
            data: None,
        }
    }

    /// Create a CDP error from a protocol error response
    pub fn cdp_response<S: Into<String>>(msg: S, code: i32, data: Option<serde_json::Value>) -> Self {
        Error::Cdp {
            message: msg.into(),
            code: Some(code),
            data,
        }
    }

    /// Create a new remote exception error
    pub fn remote_exception<S: Into<String>>(text: S, details: serde_json::Value) -> Self {
        Error::RemoteException {
            text: text.into(),
            details,
        }
    }

    /// Create a new node resolution error
    pub fn node_resolution<S: Into<String>>(msg: S) -> Self {
        Error::NodeResolution(msg.into())
    }

    /// Create a new load abandoned error
    pub fn load_abandoned<S: Into<String>>(msg: S) -> Self {
        Error::LoadAbandoned(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether the error was raised by code running in the remote runtime
    pub fn is_remote_exception(&self) -> bool {
        matches!(self, Error::RemoteException { .. })
    }
}
