//! Remote call dispatcher
//!
//! Turns a [`PendingCall`] into one `Runtime.callFunctionOn` against the
//! target handle, after all of its arguments have been resolved.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::args::{resolve_all, CallArg, ResolvedArg};
use crate::cdp::traits::CdpClient;
use crate::cdp::types::{ObjectHandle, RemoteObject, RuntimeResponse};
use crate::Result;

/// Low-level completion handler, invoked with the raw protocol outcome
/// before the call's own result settles.
pub type Completion = Box<dyn FnOnce(&Result<RuntimeResponse>) + Send>;

/// One remote invocation in flight
pub struct PendingCall {
    target: ObjectHandle,
    function: String,
    args: Vec<CallArg>,
    completion: Option<Completion>,
}

impl PendingCall {
    /// Call `namespace.method` with `this` bound to `target`
    pub fn new(target: ObjectHandle, namespace: &str, method: &str) -> Self {
        Self {
            target,
            function: format!("{}.{}", namespace, method),
            args: Vec::new(),
            completion: None,
        }
    }

    /// Positional arguments
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = CallArg>,
    {
        self.args = args.into_iter().collect();
        self
    }

    /// Completion handler
    pub fn with_completion(mut self, completion: Option<Completion>) -> Self {
        self.completion = completion;
        self
    }

    /// Fully qualified function name sent to the remote runtime
    pub fn function(&self) -> &str {
        &self.function
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("target", &self.target)
            .field("function", &self.function)
            .field("args", &self.args)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

/// Dispatches calls against remote object handles
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Arc<dyn CdpClient>,
}

impl Dispatcher {
    /// Create a dispatcher on top of `client`
    pub fn new(client: Arc<dyn CdpClient>) -> Self {
        Self { client }
    }

    /// Resolve arguments, call the function, and settle exactly once
    ///
    /// A failed resolution fails the call before anything is sent. Transport
    /// errors and remote exceptions both come back as `Err`.
    pub async fn dispatch(&self, call: PendingCall) -> Result<RemoteObject> {
        let PendingCall {
            target,
            function,
            args,
            completion,
        } = call;

        let resolved = resolve_all(&args).await.map_err(|e| {
            warn!("Not calling {}: argument resolution failed: {}", function, e);
            e
        })?;

        let params = resolved
            .into_iter()
            .map(ResolvedArg::into_call_argument)
            .collect();

        debug!("Dispatching {} on {}", function, target);
        let response = self.client.call_function_on(&target, &function, params).await;

        if let Some(completion) = completion {
            completion(&response);
        }

        response?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::client::CdpClientImpl;
    use crate::cdp::mock::{MockCdpConnection, MockResponse};
    use crate::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher() -> (Arc<MockCdpConnection>, Dispatcher) {
        let connection = Arc::new(MockCdpConnection::new());
        let client = Arc::new(CdpClientImpl::new(connection.clone()));
        (connection, Dispatcher::new(client))
    }

    #[tokio::test]
    async fn test_literal_arguments_sent_verbatim() {
        let (connection, dispatcher) = dispatcher();

        let call = PendingCall::new(ObjectHandle::new("ld"), "_LD", "setStyle")
            .with_args(vec!["color".into(), json!({ "a": [1, 2] }).into(), 4_i64.into()]);
        assert_eq!(call.function(), "_LD.setStyle");
        dispatcher.dispatch(call).await.unwrap();

        let commands = connection.commands_for("Runtime.callFunctionOn").await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].params["functionDeclaration"], "_LD.setStyle");
        assert_eq!(
            commands[0].params["arguments"],
            json!([ { "value": "color" }, { "value": { "a": [1, 2] } }, { "value": 4 } ])
        );
    }

    #[tokio::test]
    async fn test_completion_sees_raw_response() {
        let (connection, dispatcher) = dispatcher();
        connection
            .respond_to("Runtime.callFunctionOn", MockResponse::thrown("Error: nope"))
            .await;

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_handler = seen.clone();
        let completion: Completion = Box::new(move |response| {
            if let Ok(raw) = response {
                assert!(raw.threw());
                seen_in_handler.fetch_add(1, Ordering::SeqCst);
            }
        });

        let result = dispatcher
            .dispatch(PendingCall::new(ObjectHandle::new("ld"), "_LD", "fail").with_completion(Some(completion)))
            .await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::RemoteException { text, .. }) if text == "Error: nope"));
    }

    #[tokio::test]
    async fn test_transport_error_rejects() {
        let (connection, dispatcher) = dispatcher();
        connection
            .respond_to("Runtime.callFunctionOn", MockResponse::error(-32000, "Could not find object with given id"))
            .await;

        let err = dispatcher
            .dispatch(PendingCall::new(ObjectHandle::new("gone"), "_LD", "keepAlive"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cdp { .. }));
    }
}
