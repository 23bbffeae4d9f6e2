//! The remote agent
//!
//! [`RemoteAgent`] owns the remote context of one page. `load()` subscribes to
//! the page's load, navigation and attribute notifications. Each load-complete
//! starts two independent injections: the command namespace, which settles the
//! pending load and (re)starts the keep-alive, and the utility library, which
//! only records its handle. Neither holds up the notification listener.
//! Application code then calls into the page through [`RemoteAgent::call`]
//! and listens to relayed events.

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::args::{CallArg, DomNode};
use super::context::{LifecycleState, RemoteContext};
use super::dispatcher::{Completion, Dispatcher, PendingCall};
use super::element::RemoteElement;
use super::heartbeat::Heartbeat;
use super::payload::{Payloads, COMMAND_NAMESPACE, LIBRARY_NAMESPACE};
use super::relay::{EventRelay, NamedEvents, RelayedEvent};
use crate::cdp::traits::{CdpClient, CdpEvent, EvaluateOptions};
use crate::cdp::types::{
    AttributeModified, ObjectHandle, RemoteObject, RuntimeResponse, ATTRIBUTE_MODIFIED, FRAME_STARTED_LOADING,
    LOAD_EVENT_FIRED,
};
use crate::config::Config;
use crate::{Error, Result};

/// Default keep-alive interval
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of relayed events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Tunables of a [`RemoteAgent`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Flag handed to the function payload on injection
    pub experimental: bool,
    /// Keep-alive period while the context is ready
    pub keep_alive_interval: Duration,
    /// Relayed events buffered per subscriber
    pub event_capacity: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            experimental: false,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&Config> for BridgeOptions {
    fn from(config: &Config) -> Self {
        Self {
            experimental: config.experimental,
            keep_alive_interval: config.keep_alive_interval(),
            ..Self::default()
        }
    }
}

/// Completion of a `load()`
///
/// Resolves once the command namespace has been injected after the next
/// load-complete notification. Fails with the injection error, or with
/// [`Error::LoadAbandoned`] when the agent is unloaded or loaded again first.
#[derive(Debug)]
pub struct PendingLoad {
    rx: oneshot::Receiver<Result<()>>,
}

impl Future for PendingLoad {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|settled| {
            settled.unwrap_or_else(|_| Err(Error::load_abandoned("bridge unloaded before injection completed")))
        })
    }
}

#[derive(Debug)]
struct AgentInner {
    client: Arc<dyn CdpClient>,
    dispatcher: Dispatcher,
    payloads: Payloads,
    options: BridgeOptions,
    context: RwLock<RemoteContext>,
    heartbeat: Heartbeat,
    relay: EventRelay,
    listener: Mutex<Option<JoinHandle<()>>>,
    injections: Mutex<Vec<JoinHandle<()>>>,
    pending_load: Mutex<Option<oneshot::Sender<Result<()>>>>,
}

impl AgentInner {
    async fn settle_load(&self, outcome: Result<()>) {
        if let Some(tx) = self.pending_load.lock().await.take() {
            let _ = tx.send(outcome);
        }
    }

    /// Start both injections for the document that just loaded
    ///
    /// Injections still running for a previous document are aborted.
    async fn begin_injection(self: &Arc<Self>) {
        let mut injections = self.injections.lock().await;
        for stale in injections.drain(..) {
            stale.abort();
        }

        let command_expression = self.payloads.command_expression(self.options.experimental);
        let client = Arc::clone(&self.client);
        let agent = Arc::downgrade(self);
        injections.push(tokio::spawn(async move {
            let outcome = evaluate_handle(client.as_ref(), &command_expression).await;
            if let Some(inner) = agent.upgrade() {
                inner.command_injected(outcome).await;
            }
        }));

        if let Some(library_expression) = self.payloads.library_expression() {
            let client = Arc::clone(&self.client);
            let agent = Arc::downgrade(self);
            injections.push(tokio::spawn(async move {
                let outcome = evaluate_handle(client.as_ref(), &library_expression).await;
                if let Some(inner) = agent.upgrade() {
                    inner.library_injected(outcome).await;
                }
            }));
        }
    }

    async fn cancel_injections(&self) {
        for task in self.injections.lock().await.drain(..) {
            task.abort();
        }
    }

    async fn command_injected(&self, outcome: Result<ObjectHandle>) {
        match outcome {
            Ok(handle) => {
                if self.context.write().await.command_injected(handle.clone()) {
                    info!("Command namespace injected: {}", handle);
                    self.heartbeat.start(self.dispatcher.clone(), handle).await;
                }
                self.settle_load(Ok(())).await;
            }
            Err(e) => {
                error!("Command namespace injection failed: {}", e);
                self.settle_load(Err(e)).await;
            }
        }
    }

    async fn library_injected(&self, outcome: Result<ObjectHandle>) {
        match outcome {
            Ok(handle) => {
                if self.context.write().await.utility_injected(handle.clone()) {
                    debug!("Utility library injected: {}", handle);
                }
            }
            Err(e) => warn!("Utility library injection failed: {}", e),
        }
    }

    async fn navigation_started(&self) {
        debug!("Navigation started, invalidating remote handles");
        self.cancel_injections().await;
        self.heartbeat.stop().await;
        self.context.write().await.navigation_started();
    }

    fn attribute_modified(&self, params: serde_json::Value) {
        match serde_json::from_value::<AttributeModified>(params) {
            Ok(notification) => {
                self.relay.relay(&notification);
            }
            Err(e) => warn!("Malformed {} notification: {}", ATTRIBUTE_MODIFIED, e),
        }
    }
}

impl Drop for AgentInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
        for task in self.injections.get_mut().drain(..) {
            task.abort();
        }
    }
}

async fn evaluate_handle(client: &dyn CdpClient, expression: &str) -> Result<ObjectHandle> {
    let object = client
        .evaluate(expression, EvaluateOptions::default())
        .await
        .and_then(RuntimeResponse::into_result)?;

    object
        .object_id
        .ok_or_else(|| Error::cdp("Injected payload did not evaluate to an object"))
}

async fn listen(agent: Weak<AgentInner>, mut events: mpsc::Receiver<CdpEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = agent.upgrade() else {
            break;
        };

        debug!("Page notification: {}", event.method);
        match event.method.as_str() {
            LOAD_EVENT_FIRED => inner.begin_injection().await,
            FRAME_STARTED_LOADING => inner.navigation_started().await,
            ATTRIBUTE_MODIFIED => inner.attribute_modified(event.params),
            _ => {}
        }
    }

    debug!("Page notification listener stopped");
}

/// Bridge into the page behind one CDP client
#[derive(Debug, Clone)]
pub struct RemoteAgent {
    inner: Arc<AgentInner>,
}

impl RemoteAgent {
    /// Create an unloaded agent
    pub fn new(client: Arc<dyn CdpClient>, payloads: Payloads, options: BridgeOptions) -> Self {
        let inner = AgentInner {
            dispatcher: Dispatcher::new(Arc::clone(&client)),
            heartbeat: Heartbeat::new(options.keep_alive_interval),
            relay: EventRelay::new(options.event_capacity),
            client,
            payloads,
            options,
            context: RwLock::new(RemoteContext::default()),
            listener: Mutex::new(None),
            injections: Mutex::new(Vec::new()),
            pending_load: Mutex::new(None),
        };

        Self { inner: Arc::new(inner) }
    }

    /// Start listening to the page
    ///
    /// Returns once the notifications are subscribed; the returned
    /// [`PendingLoad`] resolves after the next load-complete injected the
    /// command namespace. Loading an already loaded agent replaces the
    /// previous listener and keep-alive.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<PendingLoad> {
        let events = self
            .inner
            .client
            .subscribe_events(&[LOAD_EVENT_FIRED, FRAME_STARTED_LOADING, ATTRIBUTE_MODIFIED])
            .await?;

        let mut listener = self.inner.listener.lock().await;
        if let Some(previous) = listener.take() {
            debug!("Replacing previous page listener");
            previous.abort();
        }
        self.inner.cancel_injections().await;
        self.inner.heartbeat.stop().await;

        let (tx, rx) = oneshot::channel();
        *self.inner.pending_load.lock().await = Some(tx);
        self.inner.context.write().await.begin_load();

        *listener = Some(tokio::spawn(listen(Arc::downgrade(&self.inner), events)));
        info!("Remote agent loading");

        Ok(PendingLoad { rx })
    }

    /// Stop listening to the page and forget its handles
    #[instrument(skip(self))]
    pub async fn unload(&self) {
        if let Some(listener) = self.inner.listener.lock().await.take() {
            listener.abort();
        }
        self.inner.cancel_injections().await;
        self.inner.heartbeat.stop().await;
        self.inner.context.write().await.unload();
        self.inner.pending_load.lock().await.take();
        info!("Remote agent unloaded");
    }

    /// Call a method of the injected command namespace
    ///
    /// # Panics
    ///
    /// Panics when no command handle is established, i.e. before a `load()`
    /// completed or after `unload()`.
    pub async fn call(&self, method: &str, args: Vec<CallArg>) -> Result<RemoteObject> {
        self.call_with(method, args, None).await
    }

    /// [`call`](Self::call) with a completion handler that sees the raw protocol outcome
    ///
    /// # Panics
    ///
    /// Same as [`call`](Self::call).
    #[instrument(skip(self, args, completion))]
    pub async fn call_with(
        &self,
        method: &str,
        args: Vec<CallArg>,
        completion: Option<Completion>,
    ) -> Result<RemoteObject> {
        let target = self.inner.context.read().await.command_handle().cloned();
        let Some(target) = target else {
            panic!("Remote call '{}' issued without a command handle; load() must complete first", method);
        };

        let call = PendingCall::new(target, COMMAND_NAMESPACE, method)
            .with_args(args)
            .with_completion(completion);
        self.inner.dispatcher.dispatch(call).await
    }

    /// Call a method of the injected utility library
    ///
    /// # Panics
    ///
    /// Panics when no utility handle is established.
    #[instrument(skip(self, args))]
    pub async fn library_call(&self, method: &str, args: Vec<CallArg>) -> Result<RemoteObject> {
        let target = self.inner.context.read().await.utility_handle().cloned();
        let Some(target) = target else {
            panic!("Library call '{}' issued without a utility handle; load() must complete first", method);
        };

        let call = PendingCall::new(target, LIBRARY_NAMESPACE, method).with_args(args);
        self.inner.dispatcher.dispatch(call).await
    }

    /// Proxy for the element carrying `marker_id`
    pub fn remote_element<S: Into<String>>(&self, marker_id: S) -> RemoteElement {
        RemoteElement::new(marker_id, Arc::clone(&self.inner.client))
    }

    /// Node reference for a DOM `nodeId` of this page
    pub fn dom_node(&self, node_id: i64) -> DomNode {
        DomNode::new(node_id, Arc::clone(&self.inner.client))
    }

    /// Every relayed event
    pub fn events(&self) -> broadcast::Receiver<RelayedEvent> {
        self.inner.relay.subscribe()
    }

    /// Relayed events named `name`
    pub fn subscribe<S: Into<String>>(&self, name: S) -> NamedEvents {
        self.inner.relay.subscribe_to(name)
    }

    /// Every relayed event as a stream
    pub fn event_stream(&self) -> impl Stream<Item = RelayedEvent> + Send + 'static {
        self.inner.relay.stream()
    }

    /// Current lifecycle state
    pub async fn state(&self) -> LifecycleState {
        self.inner.context.read().await.state()
    }

    /// Snapshot of the remote context
    pub async fn context(&self) -> RemoteContext {
        let context = self.inner.context.read().await;
        context.snapshot(self.inner.heartbeat.is_active().await)
    }

    /// Whether the keep-alive timer is running
    pub async fn heartbeat_active(&self) -> bool {
        self.inner.heartbeat.is_active().await
    }

    /// Options the agent was built with
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// Underlying CDP client
    pub fn client(&self) -> Arc<dyn CdpClient> {
        Arc::clone(&self.inner.client)
    }
}
