//! CDP WebSocket connection implementation
//!
//! This module provides WebSocket-based connection to Chrome DevTools Protocol.
//! Outgoing commands go through a shared sink; a reader task routes responses
//! to their waiters and broadcasts notifications to event listeners.

use super::traits::{CdpConnection, CdpError as CdpErrorResponse, CdpEvent, CdpResponse};
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;
type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<CdpEvent>>>>;

/// CDP timeout configuration
#[derive(Debug, Clone)]
pub struct CdpTimeoutConfig {
    /// Default timeout for most commands
    pub default_timeout: tokio::time::Duration,
    /// Timeout for Runtime evaluation and calls, which may run page script
    pub execution_timeout: tokio::time::Duration,
}

impl Default for CdpTimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: tokio::time::Duration::from_secs(30),
            execution_timeout: tokio::time::Duration::from_secs(30),
        }
    }
}

impl CdpTimeoutConfig {
    /// Use the same timeout for every command
    pub fn uniform(timeout: tokio::time::Duration) -> Self {
        Self {
            default_timeout: timeout,
            execution_timeout: timeout,
        }
    }

    fn timeout_for(&self, method: &str) -> tokio::time::Duration {
        if method.starts_with("Runtime.") {
            self.execution_timeout
        } else {
            self.default_timeout
        }
    }
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Write half of the WebSocket
    sink: Mutex<SplitSink<WsStream, Message>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending_commands: PendingMap,
    /// Event subscribers
    event_subscribers: Subscribers,
    /// Is connection active
    is_active: Arc<AtomicBool>,
    /// Reader task
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Timeout configuration
    timeout_config: CdpTimeoutConfig,
}

impl CdpWebSocketConnection {
    /// Connect to a target with default timeouts
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn new<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        Self::with_timeouts(url, CdpTimeoutConfig::default()).await
    }

    /// Connect to a target with explicit timeouts
    pub async fn with_timeouts<S: Into<String>>(url: S, timeout_config: CdpTimeoutConfig) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect: {}", e)))?;
        let (sink, stream) = ws_stream.split();

        let connection = Arc::new(Self {
            url,
            sink: Mutex::new(sink),
            next_id: AtomicU64::new(1),
            pending_commands: Arc::new(Mutex::new(HashMap::new())),
            event_subscribers: Arc::new(Mutex::new(Vec::new())),
            is_active: Arc::new(AtomicBool::new(true)),
            reader: Mutex::new(None),
            timeout_config,
        });

        let reader = tokio::spawn(Self::message_loop(
            stream,
            Arc::clone(&connection.pending_commands),
            Arc::clone(&connection.event_subscribers),
            Arc::clone(&connection.is_active),
        ));
        *connection.reader.lock().await = Some(reader);

        info!("WebSocket connection established");
        Ok(connection)
    }

    /// WebSocket URL of the target
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Message processing loop
    async fn message_loop(
        mut stream: SplitStream<WsStream>,
        pending_commands: PendingMap,
        event_subscribers: Subscribers,
        is_active: Arc<AtomicBool>,
    ) {
        debug!("CDP message loop started");

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    Self::handle_message(&text, &pending_commands, &event_subscribers).await;
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            }
        }

        is_active.store(false, Ordering::SeqCst);

        // Waiters see their sender dropped and fail instead of hanging
        pending_commands.lock().await.clear();
        event_subscribers.lock().await.clear();
        debug!("CDP message loop exited");
    }

    /// Handle incoming WebSocket message
    async fn handle_message(text: &str, pending_commands: &PendingMap, event_subscribers: &Subscribers) {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            Self::handle_response(response, pending_commands).await;
            return;
        }

        if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
            Self::handle_notification(notification, event_subscribers).await;
            return;
        }

        warn!("Unknown message format: {}", text);
    }

    /// Handle CDP response
    async fn handle_response(response: CdpRpcResponse, pending_commands: &PendingMap) {
        let pending = pending_commands.lock().await.remove(&response.id);

        match pending {
            Some(pending_cmd) => {
                debug!("Received response for command {}: {}", response.id, pending_cmd.method);

                let cdp_response = CdpResponse {
                    id: response.id,
                    result: Some(response.result),
                    error: response.error.map(|e| CdpErrorResponse {
                        code: e.code,
                        message: e.message,
                        data: e.data,
                    }),
                };

                let _ = pending_cmd.sender.send(cdp_response);
            }
            None => warn!("Received response for unknown command ID: {}", response.id),
        }
    }

    /// Handle CDP notification/event
    async fn handle_notification(notification: CdpNotification, event_subscribers: &Subscribers) {
        debug!("Received event: {}", notification.method);

        let event = CdpEvent {
            method: notification.method,
            params: notification.params,
            session_id: notification.session_id,
        };

        event_subscribers
            .lock()
            .await
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for CdpWebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpWebSocketConnection")
            .field("url", &self.url)
            .field("is_active", &self.is_active.load(Ordering::SeqCst))
            .field("timeout_config", &self.timeout_config)
            .finish()
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id: None,
        };
        let json = serde_json::to_string(&request)?;

        debug!("Sending CDP command {}: {}", id, method);

        let (sender, receiver) = oneshot::channel();
        self.pending_commands.lock().await.insert(
            id,
            PendingCommand {
                sender,
                method: method.to_string(),
            },
        );

        if let Err(e) = self.sink.lock().await.send(Message::Text(json)).await {
            self.pending_commands.lock().await.remove(&id);
            return Err(Error::websocket(format!("Failed to send message: {}", e)));
        }

        let timeout_duration = self.timeout_config.timeout_for(method);
        match tokio::time::timeout(timeout_duration, receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    return Err(error.into());
                }
                Ok(response)
            }
            Ok(Err(_)) => Err(Error::websocket(format!("Connection closed before command {} completed", id))),
            Err(_) => {
                self.pending_commands.lock().await.remove(&id);
                Err(Error::timeout(format!("Command {} ({}) timed out", id, method)))
            }
        }
    }

    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let (sender, receiver) = mpsc::channel(100);
        let (unbounded_sender, mut unbounded_receiver) = mpsc::unbounded_channel();

        self.event_subscribers.lock().await.push(unbounded_sender);

        // Forward events to bounded channel
        tokio::spawn(async move {
            while let Some(event) = unbounded_receiver.recv().await {
                if sender.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(receiver)
    }

    async fn close(&self) -> Result<(), Error> {
        info!("Closing CDP WebSocket connection");

        self.is_active.store(false, Ordering::SeqCst);

        let close_result = self.sink.lock().await.close().await;

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.pending_commands.lock().await.clear();
        self.event_subscribers.lock().await.clear();

        close_result.map_err(|e| Error::websocket(format!("Failed to close WebSocket: {}", e)))
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
