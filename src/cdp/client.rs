//! CDP client implementation
//!
//! This module provides a high-level CDP client with typed methods for the
//! Runtime and DOM operations used by the agent.

use super::traits::*;
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        info!("Creating CDP client");
        Self { connection }
    }

    fn parse_runtime_response(method: &str, result: serde_json::Value) -> Result<RuntimeResponse, Error> {
        serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse {} response: {}", method, e)))
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    async fn evaluate(&self, expression: &str, options: EvaluateOptions) -> Result<RuntimeResponse, Error> {
        debug!("Evaluating expression ({} bytes)", expression.len());

        let params = EvaluateParams {
            expression: expression.to_string(),
            object_group: None,
            await_promise: options.await_promise.then_some(true),
            return_by_value: options.return_by_value.then_some(true),
            context_id: None,
        };

        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        Self::parse_runtime_response("Runtime.evaluate", result)
    }

    async fn call_function_on(
        &self,
        target: &ObjectHandle,
        function_declaration: &str,
        arguments: Vec<CallArgument>,
    ) -> Result<RuntimeResponse, Error> {
        debug!(
            "Calling {} on {} with {} argument(s)",
            function_declaration,
            target,
            arguments.len()
        );

        let params = CallFunctionOnParams {
            object_id: target.clone(),
            function_declaration: function_declaration.to_string(),
            arguments,
            return_by_value: None,
            await_promise: None,
        };

        let result = self
            .call_method("Runtime.callFunctionOn", serde_json::to_value(params)?)
            .await?;

        Self::parse_runtime_response("Runtime.callFunctionOn", result)
    }

    async fn resolve_node(&self, node_id: i64) -> Result<RemoteObject, Error> {
        debug!("Resolving node {}", node_id);

        let result = self
            .call_method("DOM.resolveNode", serde_json::json!({ "nodeId": node_id }))
            .await
            .map_err(|e| Error::node_resolution(format!("node {}: {}", node_id, e)))?;

        let response: ResolveNodeResponse = serde_json::from_value(result)
            .map_err(|e| Error::node_resolution(format!("node {}: malformed response: {}", node_id, e)))?;

        Ok(response.object)
    }

    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        info!("Enabling domain: {}", domain);

        let method = format!("{}.enable", domain);
        let _ = self.call_method(&method, serde_json::json!({})).await?;

        Ok(())
    }

    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        debug!("Calling CDP method: {}", method);

        let response = self.connection.send_command(method, params).await?;

        if let Some(error) = response.error {
            return Err(error.into());
        }

        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }

    async fn subscribe_events(&self, event_types: &[&str]) -> Result<tokio::sync::mpsc::Receiver<CdpEvent>, Error> {
        info!("Subscribing to events: {:?}", event_types);

        let mut event_receiver = self.connection.listen_events().await?;

        let (tx, rx) = tokio::sync::mpsc::channel(100);
        let filter: Vec<String> = event_types.iter().map(|s| s.to_string()).collect();

        tokio::spawn(async move {
            while let Some(event) = event_receiver.recv().await {
                let wanted = filter.is_empty() || filter.iter().any(|m| *m == event.method);
                if wanted && tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}
