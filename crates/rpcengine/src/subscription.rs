//! Event feeds and the subscription bridge.
//!
//! A [`Feed`] is a local event emitter. Mounting one on an engine lets the
//! peer call the builtin `subscribe` / `unsubscribe` methods with a dotted
//! name (`"feed.path.event"`); while subscribed, every event the feed emits
//! is forwarded to the peer as a notification named after the subscription.
//!
//! On the receiving side, listeners registered with
//! [`Engine::subscribe`](crate::Engine::subscribe) are fed from those
//! notifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rpcengine_common::RpcError;
use serde_json::Value;

use crate::tree::{split_path, MountChange, MountTable};

/// Builtin method that starts forwarding a feed event.
pub const SUBSCRIBE_METHOD: &str = "subscribe";
/// Builtin method that stops forwarding a feed event.
pub const UNSUBSCRIBE_METHOD: &str = "unsubscribe";

/// Handle returned when registering a listener, used to remove it again.
pub type ListenerId = u64;

pub(crate) type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Named listener lists with stable ids.
#[derive(Default)]
struct Listeners {
    by_name: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    fn add(&mut self, name: &str, id: ListenerId, listener: Listener) -> bool {
        let list = self.by_name.entry(name.to_string()).or_default();
        list.push((id, listener));
        list.len() == 1
    }

    /// Returns whether the list for `name` is now empty, or `None` when the
    /// listener was not registered.
    fn remove(&mut self, name: &str, id: ListenerId) -> Option<bool> {
        let list = self.by_name.get_mut(name)?;
        let index = list.iter().position(|(lid, _)| *lid == id)?;
        list.remove(index);
        let now_empty = list.is_empty();
        if now_empty {
            self.by_name.remove(name);
        }
        Some(now_empty)
    }

    fn snapshot(&self, name: &str) -> Vec<Listener> {
        self.by_name
            .get(name)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    fn count(&self, name: &str) -> usize {
        self.by_name.get(name).map_or(0, Vec::len)
    }
}

/// A local event emitter that can be mounted on an engine.
///
/// # Example
///
/// ```
/// use rpcengine::Feed;
/// use serde_json::json;
///
/// let feed = Feed::new();
/// let id = feed.on("tick", |payload| println!("tick {}", payload));
/// assert_eq!(feed.emit("tick", &json!(1)), 1);
/// assert!(feed.off("tick", id));
/// ```
#[derive(Default)]
pub struct Feed {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).add(event, id, Arc::new(listener));
        id
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        lock(&self.listeners).remove(event, id).is_some()
    }

    /// Calls every listener of `event` and returns how many there were.
    ///
    /// Listeners run outside the feed's lock and may register or remove
    /// listeners themselves.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let listeners = lock(&self.listeners).snapshot(event);
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        lock(&self.listeners).count(event)
    }
}

impl fmt::Debug for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = lock(&self.listeners);
        let mut events: Vec<&str> = listeners.by_name.keys().map(String::as_str).collect();
        events.sort_unstable();
        f.debug_struct("Feed").field("events", &events).finish()
    }
}

struct Forward {
    feed_path: String,
    feed: Arc<Feed>,
    event: String,
    listener: ListenerId,
}

impl Forward {
    fn detach(self) {
        self.feed.off(&self.event, self.listener);
    }
}

/// Serving side: mounted feeds and the forwarders attached to them on behalf
/// of the peer.
pub(crate) struct SubscriptionBridge {
    feeds: MountTable<Feed>,
    enabled: AtomicBool,
    forwards: Mutex<HashMap<String, Forward>>,
}

impl SubscriptionBridge {
    pub(crate) fn new() -> Self {
        Self {
            feeds: MountTable::new(),
            enabled: AtomicBool::new(false),
            forwards: Mutex::new(HashMap::new()),
        }
    }

    /// Builtins answer only once a feed has been mounted at least once.
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_feed(&self, path: &str, feed: Option<Arc<Feed>>) -> MountChange {
        if feed.is_some() {
            self.enabled.store(true, Ordering::Release);
        }
        let change = self.feeds.set(path, feed);
        if matches!(change, MountChange::Removed | MountChange::Replaced) {
            let detached = self.detach_where(|forward| forward.feed_path == path);
            if detached > 0 {
                tracing::debug!("Dropped {} subscription(s) of unmounted feed '{}'", detached, path);
            }
        }
        change
    }

    pub(crate) fn get_feed(&self, path: &str) -> Option<Arc<Feed>> {
        self.feeds.get(path)
    }

    pub(crate) fn feed_paths(&self) -> Vec<String> {
        self.feeds.paths()
    }

    /// Attaches `forward` to the event addressed by `name`. Subscribing to
    /// a name that is already forwarded is a no-op.
    pub(crate) fn subscribe<F>(&self, name: &str, delimiter: &str, forward: F) -> Result<(), RpcError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut forwards = lock(&self.forwards);
        if forwards.contains_key(name) {
            return Ok(());
        }

        let (feed_path, event) = split_path(name, delimiter);
        let feed = self
            .feeds
            .get(feed_path)
            .ok_or_else(|| RpcError::feed_not_found(name))?;
        let listener = feed.on(event, forward);

        forwards.insert(
            name.to_string(),
            Forward {
                feed_path: feed_path.to_string(),
                feed,
                event: event.to_string(),
                listener,
            },
        );
        Ok(())
    }

    pub(crate) fn unsubscribe(&self, name: &str) -> bool {
        let removed = lock(&self.forwards).remove(name);
        match removed {
            Some(forward) => {
                forward.detach();
                true
            }
            None => false,
        }
    }

    pub(crate) fn detach_all(&self) -> usize {
        self.detach_where(|_| true)
    }

    pub(crate) fn active(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.forwards).keys().cloned().collect();
        names.sort();
        names
    }

    fn detach_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&Forward) -> bool,
    {
        let detached: Vec<Forward> = {
            let mut forwards = lock(&self.forwards);
            let names: Vec<String> = forwards
                .iter()
                .filter(|(_, forward)| predicate(forward))
                .map(|(name, _)| name.clone())
                .collect();
            names.iter().filter_map(|name| forwards.remove(name)).collect()
        };
        let count = detached.len();
        detached.into_iter().for_each(Forward::detach);
        count
    }
}

/// Calling side: listeners for events the peer forwards to us.
#[derive(Default)]
pub(crate) struct RemoteListeners {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
}

impl RemoteListeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the new id and whether it is the first listener for `name`.
    pub(crate) fn add(&self, name: &str, listener: Listener) -> (ListenerId, bool) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let first = lock(&self.listeners).add(name, id, listener);
        (id, first)
    }

    /// Returns whether `name` has no listeners left, or `None` if `id` was
    /// not registered.
    pub(crate) fn remove(&self, name: &str, id: ListenerId) -> Option<bool> {
        lock(&self.listeners).remove(name, id)
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        lock(&self.listeners).count(name) > 0
    }

    pub(crate) fn deliver(&self, name: &str, payload: &Value) -> usize {
        let listeners = lock(&self.listeners).snapshot(name);
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }
}
