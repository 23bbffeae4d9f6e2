//! Mock CDP implementation for testing
//!
//! [`MockCdpConnection`] records every command it receives, answers with
//! scripted or default responses, and lets tests push protocol events.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::cdp::traits::*;
use crate::Error;

/// Command received by the mock
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    /// Request ID
    pub id: u64,
    /// Method name
    pub method: String,
    /// Parameters as sent
    pub params: Value,
}

/// Scripted answer to a command
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Successful response carrying `result`
    Result(Value),
    /// Protocol error response
    Error {
        /// Error code
        code: i32,
        /// Error message
        message: String,
    },
}

impl MockResponse {
    /// Successful response
    pub fn result(value: Value) -> Self {
        MockResponse::Result(value)
    }

    /// Protocol error response
    pub fn error<S: Into<String>>(code: i32, message: S) -> Self {
        MockResponse::Error {
            code,
            message: message.into(),
        }
    }

    /// Runtime response reporting an exception thrown by remote code
    pub fn thrown<S: Into<String>>(description: S) -> Self {
        let description = description.into();
        MockResponse::Result(json!({
            "result": { "type": "object", "subtype": "error", "description": description },
            "exceptionDetails": {
                "exceptionId": 1,
                "text": "Uncaught",
                "lineNumber": 0,
                "columnNumber": 0,
                "exception": { "type": "object", "subtype": "error", "description": description }
            }
        }))
    }
}

#[derive(Debug, Clone)]
struct ResponseRule {
    method: String,
    needle: Option<String>,
    response: MockResponse,
}

impl ResponseRule {
    fn matches(&self, method: &str, params: &Value) -> bool {
        if self.method != method {
            return false;
        }
        match &self.needle {
            Some(needle) => params.to_string().contains(needle.as_str()),
            None => true,
        }
    }
}

/// Mock CDP connection
#[derive(Debug)]
pub struct MockCdpConnection {
    id: String,
    is_active: Arc<AtomicBool>,
    next_id: AtomicU64,
    commands: Mutex<Vec<RecordedCommand>>,
    rules: Mutex<Vec<ResponseRule>>,
    delays: Mutex<Vec<(String, String, Duration)>>,
    subscribers: Mutex<Vec<mpsc::Sender<CdpEvent>>>,
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_active: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(1),
            commands: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            delays: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Connection identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Answer every `method` command with `response`
    pub async fn respond_to(&self, method: &str, response: MockResponse) {
        self.push_rule(method, None, response).await;
    }

    /// Answer `method` commands whose serialized params contain `needle`
    pub async fn respond_to_matching(&self, method: &str, needle: &str, response: MockResponse) {
        self.push_rule(method, Some(needle.to_string()), response).await;
    }

    /// Hold back the answer to `method` commands whose serialized params contain `needle`
    pub async fn delay_matching(&self, method: &str, needle: &str, delay: Duration) {
        self.delays
            .lock()
            .await
            .push((method.to_string(), needle.to_string(), delay));
    }

    async fn push_rule(&self, method: &str, needle: Option<String>, response: MockResponse) {
        self.rules.lock().await.push(ResponseRule {
            method: method.to_string(),
            needle,
            response,
        });
    }

    /// All commands received so far
    pub async fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().await.clone()
    }

    /// Commands received for one method
    pub async fn commands_for(&self, method: &str) -> Vec<RecordedCommand> {
        self.commands
            .lock()
            .await
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Forget recorded commands
    pub async fn clear_commands(&self) {
        self.commands.lock().await.clear();
    }

    /// Deliver an event to every live listener
    pub async fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent::new(method, params);
        let mut subscribers = self.subscribers.lock().await;
        let mut live = Vec::with_capacity(subscribers.len());

        for sender in subscribers.drain(..) {
            if sender.send(event.clone()).await.is_ok() {
                live.push(sender);
            }
        }
        *subscribers = live;
    }

    fn default_response(method: &str, params: &Value) -> Value {
        match method {
            "Runtime.evaluate" => json!({
                "result": {
                    "type": "object",
                    "className": "Object",
                    "objectId": format!("mock-object-{}", uuid::Uuid::new_v4())
                }
            }),
            "Runtime.callFunctionOn" => json!({
                "result": { "type": "undefined" }
            }),
            "DOM.resolveNode" => {
                let node_id = params.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
                json!({
                    "object": {
                        "type": "object",
                        "subtype": "node",
                        "className": "HTMLDivElement",
                        "objectId": format!("mock-node-{}", node_id)
                    }
                })
            }
            _ => json!({}),
        }
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.commands.lock().await.push(RecordedCommand {
            id,
            method: method.to_string(),
            params: params.clone(),
        });

        let delay = self
            .delays
            .lock()
            .await
            .iter()
            .find(|(m, needle, _)| m == method && params.to_string().contains(needle.as_str()))
            .map(|(_, _, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .rules
            .lock()
            .await
            .iter()
            .rev()
            .find(|rule| rule.matches(method, &params))
            .map(|rule| rule.response.clone());

        let response = match scripted {
            Some(MockResponse::Error { code, message }) => CdpResponse {
                id,
                result: None,
                error: Some(CdpError {
                    code,
                    message,
                    data: None,
                }),
            },
            Some(MockResponse::Result(result)) => CdpResponse {
                id,
                result: Some(result),
                error: None,
            },
            None => CdpResponse {
                id,
                result: Some(Self::default_response(method, &params)),
                error: None,
            },
        };

        Ok(response)
    }

    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }

        let (tx, rx) = mpsc::channel(100);
        self.subscribers.lock().await.push(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        self.subscribers.lock().await.clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_connection_records_commands() {
        let conn = MockCdpConnection::new();
        assert!(conn.is_active());

        let response = conn
            .send_command("Runtime.evaluate", json!({ "expression": "1" }))
            .await
            .unwrap();
        assert!(response.result.is_some());
        assert!(response.error.is_none());

        let commands = conn.commands().await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].params["expression"], "1");
    }

    #[tokio::test]
    async fn test_latest_matching_rule_wins() {
        let conn = MockCdpConnection::new();
        conn.respond_to("Runtime.evaluate", MockResponse::result(json!({ "result": { "type": "number", "value": 1 } })))
            .await;
        conn.respond_to_matching("Runtime.evaluate", "jQuery", MockResponse::thrown("ReferenceError"))
            .await;

        let plain = conn.send_command("Runtime.evaluate", json!({ "expression": "1" })).await.unwrap();
        assert_eq!(plain.result.unwrap()["result"]["value"], 1);

        let thrown = conn
            .send_command("Runtime.evaluate", json!({ "expression": "jQuery.noConflict(true)" }))
            .await
            .unwrap();
        assert!(thrown.result.unwrap().get("exceptionDetails").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_answer() {
        let conn = Arc::new(MockCdpConnection::new());
        conn.delay_matching("Runtime.evaluate", "slow", Duration::from_secs(10)).await;

        let slow = tokio::spawn({
            let conn = conn.clone();
            async move { conn.send_command("Runtime.evaluate", json!({ "expression": "slow()" })).await }
        });
        assert!(conn
            .send_command("Runtime.evaluate", json!({ "expression": "fast()" }))
            .await
            .is_ok());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!slow.is_finished());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_closed_connection_rejects() {
        let conn = MockCdpConnection::new();
        conn.close().await.unwrap();
        assert!(!conn.is_active());
        assert!(conn.send_command("Page.enable", json!({})).await.is_err());
        assert!(conn.listen_events().await.is_err());
    }

    #[tokio::test]
    async fn test_emit_skips_dropped_listeners() {
        let conn = MockCdpConnection::new();
        let dropped = conn.listen_events().await.unwrap();
        let mut kept = conn.listen_events().await.unwrap();
        drop(dropped);

        conn.emit("Page.loadEventFired", json!({})).await;
        assert_eq!(kept.recv().await.unwrap().method, "Page.loadEventFired");
        assert_eq!(conn.subscribers.lock().await.len(), 1);
    }
}
