//! Path-keyed mount table shared by interfaces and feeds.
//!
//! Mounts are flat: `"outer.inner.core"` is one key, not a chain of nested
//! lookups. Resolving a dotted call path splits it once at the last
//! delimiter into a mount path and a member name.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// What a `set` did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountChange {
    /// Same object already mounted there, or nothing to remove
    Unchanged,
    Added,
    Removed,
    /// A different object was mounted at the path; counts as removal then addition
    Replaced,
}

pub(crate) struct MountTable<T: ?Sized> {
    mounts: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> MountTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            mounts: RwLock::new(HashMap::new()),
        }
    }

    /// Mounts `value` at `path`, or unmounts when `value` is `None`.
    pub(crate) fn set(&self, path: &str, value: Option<Arc<T>>) -> MountChange {
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => match mounts.insert(path.to_string(), Arc::clone(&value)) {
                None => MountChange::Added,
                Some(previous) if Arc::ptr_eq(&previous, &value) => MountChange::Unchanged,
                Some(_) => MountChange::Replaced,
            },
            None => match mounts.remove(path) {
                Some(_) => MountChange::Removed,
                None => MountChange::Unchanged,
            },
        }
    }

    pub(crate) fn get(&self, path: &str) -> Option<Arc<T>> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Splits `path` at the last `delimiter` into `(mount path, member)`.
///
/// Paths without a delimiter, and every path when the delimiter is empty,
/// address the root mount `""`.
pub fn split_path<'a>(path: &'a str, delimiter: &str) -> (&'a str, &'a str) {
    if delimiter.is_empty() {
        return ("", path);
    }
    path.rsplit_once(delimiter).unwrap_or(("", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("add", "."), ("", "add"));
        assert_eq!(split_path("outer.inner.core.add", "."), ("outer.inner.core", "add"));
        assert_eq!(split_path("a::b", "::"), ("a", "b"));
        assert_eq!(split_path("a.b", ""), ("", "a.b"));
        assert_eq!(split_path(".x", "."), ("", "x"));
    }

    #[test]
    fn test_set_reports_changes() {
        let table: MountTable<String> = MountTable::new();
        let first = Arc::new("first".to_string());

        assert_eq!(table.set("a", Some(Arc::clone(&first))), MountChange::Added);
        assert_eq!(table.set("a", Some(Arc::clone(&first))), MountChange::Unchanged);
        assert_eq!(
            table.set("a", Some(Arc::new("second".to_string()))),
            MountChange::Replaced
        );
        assert_eq!(table.get("a").as_deref().map(String::as_str), Some("second"));
        assert_eq!(table.set("a", None), MountChange::Removed);
        assert_eq!(table.set("a", None), MountChange::Unchanged);
        assert!(table.is_empty());
    }

    #[test]
    fn test_paths_sorted() {
        let table: MountTable<u8> = MountTable::new();
        table.set("b", Some(Arc::new(1)));
        table.set("a", Some(Arc::new(2)));
        table.set("", Some(Arc::new(3)));
        assert_eq!(table.paths(), vec!["", "a", "b"]);
    }
}
