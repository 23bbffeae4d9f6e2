//! Call arguments and node reference resolution
//!
//! Arguments are a tagged union: literal values go by value, handles go by
//! reference, and node references are resolved to a handle (or a plain value)
//! before the call is built.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::cdp::traits::CdpClient;
use crate::cdp::types::{CallArgument, ObjectHandle};
use crate::Result;

/// Outcome of resolving one argument
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArg {
    /// Send by value
    Value(Value),
    /// Send by reference
    Handle(ObjectHandle),
}

impl ResolvedArg {
    /// Protocol parameter for this argument
    pub fn into_call_argument(self) -> CallArgument {
        match self {
            ResolvedArg::Value(value) => CallArgument::by_value(value),
            ResolvedArg::Handle(handle) => CallArgument::by_handle(handle),
        }
    }
}

/// A live remote element that can be resolved on demand
#[async_trait]
pub trait NodeReference: Send + Sync + fmt::Debug {
    /// Protocol node id
    fn node_id(&self) -> i64;

    /// Resolve to a handle, or to a plain value when the remote returns no handle
    async fn resolve(&self) -> Result<ResolvedArg>;
}

/// Node reference backed by `DOM.resolveNode`
#[derive(Debug, Clone)]
pub struct DomNode {
    node_id: i64,
    client: Arc<dyn CdpClient>,
}

impl DomNode {
    /// Reference the node with `node_id` on the page behind `client`
    pub fn new(node_id: i64, client: Arc<dyn CdpClient>) -> Self {
        Self { node_id, client }
    }
}

#[async_trait]
impl NodeReference for DomNode {
    fn node_id(&self) -> i64 {
        self.node_id
    }

    async fn resolve(&self) -> Result<ResolvedArg> {
        let object = self.client.resolve_node(self.node_id).await?;

        Ok(match object.object_id {
            Some(handle) => ResolvedArg::Handle(handle),
            None => ResolvedArg::Value(object.value.unwrap_or(Value::Null)),
        })
    }
}

/// One positional argument of a remote call
#[derive(Debug, Clone)]
pub enum CallArg {
    /// Literal sent by value
    Literal(Value),
    /// Already known remote handle
    Handle(ObjectHandle),
    /// Node resolved right before dispatch
    Node(Arc<dyn NodeReference>),
}

impl CallArg {
    /// Wrap a node reference
    pub fn node<N: NodeReference + 'static>(node: N) -> Self {
        CallArg::Node(Arc::new(node))
    }

    /// Resolve this argument
    pub async fn resolve(&self) -> Result<ResolvedArg> {
        match self {
            CallArg::Literal(value) => Ok(ResolvedArg::Value(value.clone())),
            CallArg::Handle(handle) => Ok(ResolvedArg::Handle(handle.clone())),
            CallArg::Node(node) => {
                debug!("Resolving node argument {}", node.node_id());
                node.resolve().await
            }
        }
    }
}

impl From<Value> for CallArg {
    fn from(value: Value) -> Self {
        CallArg::Literal(value)
    }
}

impl From<&str> for CallArg {
    fn from(value: &str) -> Self {
        CallArg::Literal(Value::from(value))
    }
}

impl From<String> for CallArg {
    fn from(value: String) -> Self {
        CallArg::Literal(Value::from(value))
    }
}

impl From<bool> for CallArg {
    fn from(value: bool) -> Self {
        CallArg::Literal(Value::from(value))
    }
}

impl From<i64> for CallArg {
    fn from(value: i64) -> Self {
        CallArg::Literal(Value::from(value))
    }
}

impl From<f64> for CallArg {
    fn from(value: f64) -> Self {
        CallArg::Literal(Value::from(value))
    }
}

impl From<ObjectHandle> for CallArg {
    fn from(handle: ObjectHandle) -> Self {
        CallArg::Handle(handle)
    }
}

impl From<Arc<dyn NodeReference>> for CallArg {
    fn from(node: Arc<dyn NodeReference>) -> Self {
        CallArg::Node(node)
    }
}

/// Resolve every argument, keeping positions
///
/// Resolutions run concurrently; the first failure fails the whole set.
pub async fn resolve_all(args: &[CallArg]) -> Result<Vec<ResolvedArg>> {
    try_join_all(args.iter().map(|arg| arg.resolve())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::client::CdpClientImpl;
    use crate::cdp::mock::{MockCdpConnection, MockResponse};
    use crate::Error;
    use serde_json::json;
    use std::time::Duration;

    /// Node whose resolution takes `delay` and then yields `outcome`
    #[derive(Debug)]
    struct ScriptedNode {
        node_id: i64,
        delay: Duration,
        outcome: std::result::Result<ResolvedArg, String>,
    }

    #[async_trait]
    impl NodeReference for ScriptedNode {
        fn node_id(&self) -> i64 {
            self.node_id
        }

        async fn resolve(&self) -> Result<ResolvedArg> {
            tokio::time::sleep(self.delay).await;
            self.outcome.clone().map_err(Error::node_resolution)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_all_keeps_positions() {
        let slow = ScriptedNode {
            node_id: 1,
            delay: Duration::from_millis(50),
            outcome: Ok(ResolvedArg::Handle(ObjectHandle::new("slow"))),
        };
        let fast = ScriptedNode {
            node_id: 2,
            delay: Duration::from_millis(1),
            outcome: Ok(ResolvedArg::Handle(ObjectHandle::new("fast"))),
        };

        let resolved = resolve_all(&[CallArg::node(slow), "text".into(), CallArg::node(fast)])
            .await
            .unwrap();

        assert_eq!(
            resolved,
            vec![
                ResolvedArg::Handle(ObjectHandle::new("slow")),
                ResolvedArg::Value(json!("text")),
                ResolvedArg::Handle(ObjectHandle::new("fast")),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_all_fails_on_any_rejection() {
        let ok = ScriptedNode {
            node_id: 1,
            delay: Duration::from_millis(10),
            outcome: Ok(ResolvedArg::Handle(ObjectHandle::new("ok"))),
        };
        let broken = ScriptedNode {
            node_id: 2,
            delay: Duration::from_millis(20),
            outcome: Err("node 2 detached".to_string()),
        };

        let err = resolve_all(&[CallArg::node(ok), CallArg::node(broken)]).await.unwrap_err();
        assert!(matches!(err, Error::NodeResolution(msg) if msg == "node 2 detached"));
    }

    #[tokio::test]
    async fn test_dom_node_resolves_through_client() {
        let connection = Arc::new(MockCdpConnection::new());
        let client: Arc<dyn CdpClient> = Arc::new(CdpClientImpl::new(connection.clone()));

        let resolved = CallArg::node(DomNode::new(17, client)).resolve().await.unwrap();
        assert_eq!(resolved, ResolvedArg::Handle(ObjectHandle::new("mock-node-17")));
    }

    #[tokio::test]
    async fn test_dom_node_without_handle_is_plain_value() {
        let connection = Arc::new(MockCdpConnection::new());
        connection
            .respond_to(
                "DOM.resolveNode",
                MockResponse::result(json!({ "object": { "type": "string", "value": "#text" } })),
            )
            .await;
        let client: Arc<dyn CdpClient> = Arc::new(CdpClientImpl::new(connection));

        let resolved = DomNode::new(3, client).resolve().await.unwrap();
        assert_eq!(resolved, ResolvedArg::Value(json!("#text")));
    }

    #[test]
    fn test_into_call_argument() {
        assert_eq!(
            ResolvedArg::Value(json!(3)).into_call_argument(),
            CallArgument::by_value(json!(3))
        );
        assert_eq!(
            ResolvedArg::Handle(ObjectHandle::new("h")).into_call_argument(),
            CallArgument::by_handle(ObjectHandle::new("h"))
        );
    }
}
