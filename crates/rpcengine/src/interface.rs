//! Interfaces: named groups of handlers mounted at a path.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rpcengine_common::RpcError;
use serde_json::Value;

use crate::handler::{handler_fn, Handler};
use crate::tree::{split_path, MountTable};

/// A set of methods reachable under one mount path.
///
/// # Example
///
/// ```
/// use rpcengine::{handler_fn, Interface};
/// use serde_json::json;
///
/// let math = Interface::new()
///     .method("add", handler_fn(|p| async move {
///         Ok(json!(p.iter().filter_map(|v| v.as_i64()).sum::<i64>()))
///     }));
/// assert!(math.contains("add"));
/// ```
#[derive(Default)]
pub struct Interface {
    methods: HashMap<String, Arc<dyn Handler>>,
}

impl Interface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method, replacing any existing one with the same name.
    pub fn method<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.insert(name, handler);
        self
    }

    /// Adds a method bound to a shared receiver, so handlers can reach
    /// state owned by the interface's backing object.
    pub fn method_on<R, F, Fut>(self, name: impl Into<String>, receiver: Arc<R>, f: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(Arc<R>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        self.method(
            name,
            handler_fn(move |params| f(Arc::clone(&receiver), params)),
        )
    }

    pub fn insert<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.methods.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Interface").field("methods", &names).finish()
    }
}

impl MountTable<Interface> {
    /// Finds the handler a call path addresses, if any.
    pub(crate) fn resolve(&self, path: &str, delimiter: &str) -> Option<Arc<dyn Handler>> {
        let (mount, member) = split_path(path, delimiter);
        self.get(mount)?.get(member)
    }
}
