//! The engine: outbound calls, notifications, and shared state.
//!
//! Inbound dispatch lives in [`crate::dispatcher`]; this module owns the
//! public surface and the state both directions share.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use rpcengine_common::{Codec, Frame, Id, Request, RpcError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::event::EngineEvent;
use crate::handler::Handler;
use crate::interface::Interface;
use crate::pending::PendingCalls;
use crate::stats::{EngineStats, Stats};
use crate::subscription::{
    Feed, ListenerId, RemoteListeners, SubscriptionBridge, SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};
use crate::transport::Transport;
use crate::tree::{MountChange, MountTable};

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    transport: Box<dyn Transport>,
    pub(crate) codec: Option<Box<dyn Codec>>,
    next_id: AtomicU64,
    pub(crate) pending: PendingCalls,
    pub(crate) interfaces: MountTable<Interface>,
    pub(crate) default_method: RwLock<Option<Arc<dyn Handler>>>,
    pub(crate) bridge: SubscriptionBridge,
    pub(crate) remote: RemoteListeners,
    events: broadcast::Sender<EngineEvent>,
    pub(crate) stats: Stats,
    active_handlers: AtomicUsize,
    idle: Notify,
}

impl EngineInner {
    /// Encodes (when a codec is installed) and hands the message to the transport.
    pub(crate) fn send(&self, message: Value) -> rpcengine_common::Result<()> {
        let frame = match &self.codec {
            Some(codec) => Frame::Bytes(codec.encode(&message)?),
            None => Frame::Value(message),
        };
        self.transport.transmit(frame)
    }

    pub(crate) fn publish(&self, event: EngineEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn observe(&self, error: RpcError) {
        self.publish(EngineEvent::Error(error));
    }

    pub(crate) fn handler_started(&self) {
        self.active_handlers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn handler_finished(&self) {
        if self.active_handlers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn next_id(&self) -> Id {
        Id::Number(self.next_id.fetch_add(1, Ordering::Relaxed) as i64)
    }

    /// Shapes call arguments into the params member of a request.
    ///
    /// In object mode the first argument is sent as the whole params value,
    /// so the peer's handler receives it unchanged. It must be an object or
    /// an array, since params are structured on the wire.
    fn outbound_params(&self, path: &str, mut args: Vec<Value>) -> Result<Option<Value>, RpcError> {
        if !self.config.object_mode || args.is_empty() {
            return Ok(positional(args));
        }
        match args.swap_remove(0) {
            first @ (Value::Object(_) | Value::Array(_)) => Ok(Some(first)),
            scalar => Err(RpcError::invalid_params(format!(
                "'{}' in object mode takes an object or array, got {}",
                path, scalar
            ))),
        }
    }

    pub(crate) fn notify(&self, path: &str, args: Vec<Value>) -> Result<(), RpcError> {
        let params = self.outbound_params(path, args)?;
        self.send_notification(path, params)
    }

    /// Notification with positional params regardless of object mode.
    pub(crate) fn notify_positional(&self, path: &str, args: Vec<Value>) -> Result<(), RpcError> {
        self.send_notification(path, positional(args))
    }

    fn send_notification(&self, path: &str, params: Option<Value>) -> Result<(), RpcError> {
        if let Some(reason) = self.pending.closed_reason() {
            return Err(reason);
        }
        let request = Request::notification(path, params);
        match self.send(request.to_value()) {
            Ok(()) => {
                Stats::bump(&self.stats.notifications_sent);
                Ok(())
            }
            Err(err) => {
                Stats::bump(&self.stats.transmit_failures);
                tracing::warn!("Failed to send notification '{}': {}", path, err);
                let err = RpcError::from(err);
                self.observe(err.clone());
                Err(err)
            }
        }
    }
}

fn positional(args: Vec<Value>) -> Option<Value> {
    (!args.is_empty()).then(|| Value::Array(args))
}

/// A bidirectional remote-call engine bound to one transport.
///
/// Cloning is cheap and yields another handle to the same engine.
///
/// # Example
///
/// ```no_run
/// use rpcengine::{handler_fn, loopback, EngineConfig, Interface};
/// use serde_json::json;
///
/// # async fn demo() {
/// let (client, server) = loopback::pair(EngineConfig::default(), EngineConfig::default());
/// server.mount("", Interface::new().method("add", handler_fn(|p| async move {
///     Ok(json!(p.iter().filter_map(|v| v.as_i64()).sum::<i64>()))
/// })));
///
/// let sum = client.call("add", vec![json!(1), json!(1336)]).await.unwrap();
/// assert_eq!(sum, json!(1337));
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

/// Non-owning handle to an [`Engine`].
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.inner.upgrade().map(|inner| Engine { inner })
    }
}

impl Engine {
    /// Creates an engine that exchanges structured values with its transport.
    pub fn new<T>(config: EngineConfig, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self::build(config, Box::new(transport), None)
    }

    /// Creates an engine that encodes every outbound message with `codec` and
    /// decodes inbound byte frames with it.
    pub fn with_codec<T, C>(config: EngineConfig, transport: T, codec: C) -> Self
    where
        T: Transport + 'static,
        C: Codec + 'static,
    {
        Self::build(config, Box::new(transport), Some(Box::new(codec)))
    }

    fn build(config: EngineConfig, transport: Box<dyn Transport>, codec: Option<Box<dyn Codec>>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        tracing::debug!(
            "Creating engine (codec: {}, object mode: {}, timeout: {:?})",
            codec.as_ref().map_or("none", |c| c.name()),
            config.object_mode,
            config.timeout
        );
        Self {
            inner: Arc::new(EngineInner {
                config,
                transport,
                codec,
                next_id: AtomicU64::new(1),
                pending: PendingCalls::new(),
                interfaces: MountTable::new(),
                default_method: RwLock::new(None),
                bridge: SubscriptionBridge::new(),
                remote: RemoteListeners::new(),
                events,
                stats: Stats::new(),
                active_handlers: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Calls `path` on the peer with the configured default timeout.
    pub async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.call_inner(path, args, self.inner.config.timeout).await
    }

    /// Calls `path` with an explicit deadline, overriding the configured one.
    pub async fn call_with_timeout(
        &self,
        path: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        self.call_inner(path, args, Some(timeout)).await
    }

    /// Calls `path` and deserializes the result into `T`.
    pub async fn call_as<T: DeserializeOwned>(&self, path: &str, args: Vec<Value>) -> Result<T, RpcError> {
        let value = self.call(path, args).await?;
        serde_json::from_value(value)
            .map_err(|e| RpcError::internal_error(format!("unexpected result for '{}': {}", path, e)))
    }

    /// Calls `path` and hands the outcome to `callback` on a spawned task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn call_with<F>(&self, path: &str, args: Vec<Value>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        let engine = self.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            callback(engine.call(&path, args).await);
        })
    }

    async fn call_inner(
        &self,
        path: &str,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, RpcError> {
        let params = self.inner.outbound_params(path, args)?;
        self.call_params(path, params, timeout).await
    }

    async fn call_params(
        &self,
        path: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, RpcError> {
        let inner = &self.inner;
        let id = inner.next_id();
        let mut rx = inner.pending.register(id.clone(), path)?;
        let _guard = PendingGuard {
            pending: &inner.pending,
            id: &id,
        };

        let request = Request::call(id.clone(), path, params);
        if let Err(err) = inner.send(request.to_value()) {
            Stats::bump(&inner.stats.transmit_failures);
            tracing::warn!("Failed to send call '{}' ({}): {}", path, id, err);
            inner.pending.take(&id);
            return Err(RpcError::from(err));
        }
        Stats::bump(&inner.stats.calls_sent);
        tracing::debug!("Sent call '{}' with id {}", path, id);

        let received = match timeout {
            None => rx.await,
            Some(limit) => match tokio::time::timeout(limit, &mut rx).await {
                Ok(received) => received,
                Err(_) => match inner.pending.take(&id) {
                    Some(call) => {
                        Stats::bump(&inner.stats.calls_timed_out);
                        tracing::warn!(
                            "Call '{}' ({}) timed out after {:?}",
                            call.method(),
                            id,
                            call.elapsed()
                        );
                        return Err(RpcError::timed_out());
                    }
                    // lost the race to a response or to close(); its outcome is on the way
                    None => rx.await,
                },
            },
        };

        let outcome = received.unwrap_or_else(|_| Err(RpcError::connection_closed()));
        match &outcome {
            Ok(_) => Stats::bump(&inner.stats.calls_succeeded),
            Err(_) => Stats::bump(&inner.stats.calls_failed),
        }
        outcome
    }

    /// Sends a one-way message. Fails if the engine is closed or the
    /// transport refuses the frame; transmit failures are also published as
    /// [`EngineEvent::Error`].
    pub fn notify(&self, path: &str, args: Vec<Value>) -> Result<(), RpcError> {
        self.inner.notify(path, args)
    }

    /// Feeds one inbound frame to the engine. Never blocks: handlers run on
    /// spawned tasks, so this must be called from within a Tokio runtime.
    pub fn receive(&self, frame: impl Into<Frame>) {
        self.inner.dispatch(frame.into());
    }

    /// Shuts the engine down, failing every pending call with `reason`
    /// (default: "connection closed"). Idempotent; returns how many calls were
    /// failed by this invocation.
    pub fn close(&self, reason: Option<RpcError>) -> usize {
        let reason = reason.unwrap_or_else(RpcError::connection_closed);
        let Some(rejected) = self.inner.pending.close(reason.clone()) else {
            return 0;
        };
        let detached = self.inner.bridge.detach_all();
        tracing::info!(
            "Engine closed ({}): {} pending call(s) failed, {} subscription(s) dropped",
            reason,
            rejected,
            detached
        );
        self.inner.publish(EngineEvent::Closed { reason });
        rejected
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pending.is_closed()
    }

    /// Mounts an interface at `path` (`""` is the root), or unmounts with `None`.
    pub fn set_interface(&self, path: &str, interface: Option<Arc<Interface>>) -> MountChange {
        let change = self.inner.interfaces.set(path, interface);
        self.announce(change, path, |path| EngineEvent::InterfaceAdded { path }, |path| {
            EngineEvent::InterfaceRemoved { path }
        });
        change
    }

    /// Convenience for `set_interface(path, Some(Arc::new(interface)))`.
    pub fn mount(&self, path: &str, interface: Interface) -> Arc<Interface> {
        let interface = Arc::new(interface);
        self.set_interface(path, Some(Arc::clone(&interface)));
        interface
    }

    pub fn unmount(&self, path: &str) -> bool {
        self.set_interface(path, None) == MountChange::Removed
    }

    pub fn get_interface(&self, path: &str) -> Option<Arc<Interface>> {
        self.inner.interfaces.get(path)
    }

    pub fn interface_paths(&self) -> Vec<String> {
        self.inner.interfaces.paths()
    }

    /// Installs the catch-all for unresolved calls. It receives the
    /// requested path as its first argument, followed by the call's own.
    pub fn set_default_method<H>(&self, handler: H)
    where
        H: Handler + 'static,
    {
        *self
            .inner
            .default_method
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    pub fn clear_default_method(&self) {
        *self
            .inner
            .default_method
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Mounts a feed the peer may subscribe to, or unmounts with `None`.
    /// Unmounting drops the peer's subscriptions to it.
    pub fn set_feed(&self, path: &str, feed: Option<Arc<Feed>>) -> MountChange {
        let change = self.inner.bridge.set_feed(path, feed);
        self.announce(change, path, |path| EngineEvent::FeedAdded { path }, |path| {
            EngineEvent::FeedRemoved { path }
        });
        change
    }

    pub fn get_feed(&self, path: &str) -> Option<Arc<Feed>> {
        self.inner.bridge.get_feed(path)
    }

    pub fn feed_paths(&self) -> Vec<String> {
        self.inner.bridge.feed_paths()
    }

    /// Names the peer is currently subscribed to on this engine's feeds.
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.inner.bridge.active()
    }

    /// Listens for `name` (`"feed.path.event"`) on the peer's feeds.
    ///
    /// The first listener for a name asks the peer to start forwarding; if
    /// that request fails, the listener is not kept.
    pub async fn subscribe<F>(&self, name: &str, listener: F) -> Result<ListenerId, RpcError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let (id, first) = self.inner.remote.add(name, Arc::new(listener));
        if first {
            let params = positional(vec![Value::String(name.to_string())]);
            if let Err(err) = self
                .call_params(SUBSCRIBE_METHOD, params, self.inner.config.timeout)
                .await
            {
                self.inner.remote.remove(name, id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Removes a listener added with [`subscribe`](Self::subscribe). The last
    /// listener for a name asks the peer to stop forwarding. Returns whether
    /// the listener was registered.
    pub async fn unsubscribe(&self, name: &str, id: ListenerId) -> Result<bool, RpcError> {
        match self.inner.remote.remove(name, id) {
            None => Ok(false),
            Some(false) => Ok(true),
            Some(true) => {
                let params = positional(vec![Value::String(name.to_string())]);
                self.call_params(UNSUBSCRIBE_METHOD, params, self.inner.config.timeout)
                    .await?;
                Ok(true)
            }
        }
    }

    /// Lifecycle changes and locally observed failures.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Number of inbound requests whose handler has not finished yet.
    pub fn active_handlers(&self) -> usize {
        self.inner.active_handlers.load(Ordering::SeqCst)
    }

    /// Resolves once no handler is running, e.g. to let in-flight requests
    /// answer before closing at end of input.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.active_handlers() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn stats(&self) -> EngineStats {
        self.inner.stats.snapshot(self.inner.pending.len())
    }

    fn announce<A, R>(&self, change: MountChange, path: &str, added: A, removed: R)
    where
        A: Fn(String) -> EngineEvent,
        R: Fn(String) -> EngineEvent,
    {
        match change {
            MountChange::Unchanged => {}
            MountChange::Added => {
                tracing::debug!("Mounted '{}'", path);
                self.inner.publish(added(path.to_string()));
            }
            MountChange::Removed => {
                tracing::debug!("Unmounted '{}'", path);
                self.inner.publish(removed(path.to_string()));
            }
            MountChange::Replaced => {
                tracing::debug!("Replaced mount at '{}'", path);
                self.inner.publish(removed(path.to_string()));
                self.inner.publish(added(path.to_string()));
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("pending_calls", &self.inner.pending.len())
            .field("closed", &self.inner.pending.is_closed())
            .finish()
    }
}

/// Removes the pending entry if the caller's future is dropped mid-flight.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: &'a Id,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.take(self.id);
    }
}
