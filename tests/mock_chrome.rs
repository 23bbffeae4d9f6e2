//! Mock Chrome DevTools Protocol server
//!
//! Speaks just enough of the page protocol for the remote agent: domain
//! enables, `Page.reload` (followed by navigation and load notifications),
//! `Runtime.evaluate`, `Runtime.callFunctionOn` and `DOM.resolveNode`.
//! Tests can push arbitrary notifications to every connected client.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Mock Chrome server
pub struct MockChromeServer {
    addr: String,
    notifications: broadcast::Sender<Value>,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct ConnectionState {
    notifications: broadcast::Sender<Value>,
    requests: Arc<Mutex<Vec<Value>>>,
    injections: Arc<AtomicU64>,
}

impl MockChromeServer {
    /// Start a new mock Chrome server on a free local port
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let ws_addr = format!("ws://{}/devtools/page/mock-page", addr);

        let (notifications, _) = broadcast::channel(64);
        let state = ConnectionState {
            notifications: notifications.clone(),
            requests: Arc::new(Mutex::new(Vec::new())),
            injections: Arc::new(AtomicU64::new(0)),
        };
        let requests = Arc::clone(&state.requests);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                tracing::info!("Mock Chrome: Connection from {}", peer_addr);
                                tokio::spawn(Self::handle_connection(stream, state.clone()));
                            }
                            Err(e) => {
                                tracing::error!("Mock Chrome: Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Mock Chrome: Shutdown signal received");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr: ws_addr,
            notifications,
            requests,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Handle a WebSocket connection
    async fn handle_connection(stream: TcpStream, state: ConnectionState) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                tracing::error!("Mock Chrome: WebSocket handshake error: {}", e);
                return;
            }
        };

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut pushed = state.notifications.subscribe();

        loop {
            let outgoing = tokio::select! {
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(request) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        state.requests.lock().await.push(request.clone());
                        Self::respond(&request, &state)
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!("Mock Chrome: WebSocket error: {}", e);
                        break;
                    }
                },
                notification = pushed.recv() => match notification {
                    Ok(notification) => vec![notification],
                    Err(_) => continue,
                },
            };

            for message in outgoing {
                if ws_sender.send(Message::Text(message.to_string())).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Messages answering one request, response first
    fn respond(request: &Value, state: &ConnectionState) -> Vec<Value> {
        let id = request.get("id").and_then(Value::as_i64).unwrap_or(0);
        let method = request.get("method").and_then(Value::as_str).unwrap_or("unknown");
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        match method {
            "Page.enable" | "Runtime.enable" | "DOM.enable" => vec![json!({ "id": id, "result": {} })],
            "Page.reload" => vec![
                json!({ "id": id, "result": {} }),
                json!({ "method": "Page.frameStartedLoading", "params": { "frameId": "main" } }),
                json!({ "method": "Page.loadEventFired", "params": { "timestamp": 1.0 } }),
            ],
            "Runtime.evaluate" => {
                let expression = params["expression"].as_str().unwrap_or_default();
                let result = if expression.starts_with("window._LD=") {
                    let n = state.injections.fetch_add(1, Ordering::SeqCst) + 1;
                    json!({ "result": { "type": "object", "className": "Object", "objectId": format!("ld-namespace-{}", n) } })
                } else if expression.contains("noConflict(true)") {
                    json!({ "result": { "type": "function", "className": "Function", "objectId": "ld-jquery" } })
                } else if expression.starts_with("window._LDjQuery(") {
                    json!({ "result": { "type": "string", "value": "Hello" } })
                } else {
                    json!({ "result": { "type": "undefined" } })
                };
                vec![json!({ "id": id, "result": result })]
            }
            "Runtime.callFunctionOn" => {
                let function = params["functionDeclaration"].as_str().unwrap_or_default();
                let result = if function.ends_with(".fail") {
                    json!({
                        "result": { "type": "object", "subtype": "error", "description": "Error: failed on purpose" },
                        "exceptionDetails": {
                            "exceptionId": 1,
                            "text": "Uncaught",
                            "lineNumber": 0,
                            "columnNumber": 0,
                            "exception": { "type": "object", "subtype": "error", "description": "Error: failed on purpose" }
                        }
                    })
                } else {
                    let arguments = params["arguments"].as_array().map(Vec::len).unwrap_or(0);
                    json!({ "result": { "type": "number", "value": arguments } })
                };
                vec![json!({ "id": id, "result": result })]
            }
            "DOM.resolveNode" => {
                let node_id = params["nodeId"].as_i64().unwrap_or(0);
                if node_id > 0 {
                    vec![json!({
                        "id": id,
                        "result": { "object": { "type": "object", "subtype": "node", "objectId": format!("node-{}", node_id) } }
                    })]
                } else {
                    vec![json!({ "id": id, "error": { "code": -32000, "message": "No node with given id found" } })]
                }
            }
            _ => vec![json!({
                "id": id,
                "error": {
                    "code": -32601,
                    "message": format!("Method not implemented: {}", method)
                }
            })],
        }
    }

    /// WebSocket debugger URL of the mock page
    pub fn ws_endpoint(&self) -> &str {
        &self.addr
    }

    /// Push a notification to every connected client
    pub fn push(&self, method: &str, params: Value) {
        let _ = self.notifications.send(json!({ "method": method, "params": params }));
    }

    /// Every request received so far
    pub async fn requests(&self) -> Vec<Value> {
        self.requests.lock().await.clone()
    }

    /// Requests received for `method`
    pub async fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r["method"] == method)
            .cloned()
            .collect()
    }
}

impl Drop for MockChromeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chrome_startup() {
        let server = MockChromeServer::start().await.unwrap();
        assert!(server.ws_endpoint().starts_with("ws://127.0.0.1:"));
        assert!(server.requests().await.is_empty());
    }
}
