// # Memory Store
//
// In-memory implementation of ReactiveStore.
//
// ## Purpose
//
// Provides a complete reactive store without any UI framework: keyed
// values, change hooks, and begin/commit batching. Useful for tests,
// headless embedding, and as the reference for framework adapters.
//
// ## Dispatch
//
// Hooks are collected under the lock and invoked after it is released, so
// a hook may freely read or write the store. A write made by a hook
// outside a batch notifies immediately (nested dispatch); inside a batch
// it is folded into the pending flush.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::traits::reactive_store::{ChangeHandler, ReactiveStore, SubscriptionId};

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    hooks: HashMap<String, Vec<(SubscriptionId, ChangeHandler)>>,
    /// Keys awaiting notification, in first-dirtied order
    dirty: Vec<String>,
    depth: usize,
    next_id: u64,
    notifications: u64,
}

impl Inner {
    fn mark(&mut self, key: &str) {
        if !self.dirty.iter().any(|k| k == key) {
            self.dirty.push(key.to_string());
        }
    }

    /// Drain dirty keys into a list of hook invocations
    fn take_pending(&mut self) -> Vec<(ChangeHandler, String, Value)> {
        let keys = std::mem::take(&mut self.dirty);
        let mut pending = Vec::new();
        for key in keys {
            self.notifications += 1;
            let value = self.values.get(&key).cloned().unwrap_or(Value::Null);
            if let Some(hooks) = self.hooks.get(&key) {
                for (_, handler) in hooks {
                    pending.push((Arc::clone(handler), key.clone(), value.clone()));
                }
            }
        }
        pending
    }
}

/// In-memory reactive store
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```rust
/// use mvvm_core::store::MemoryStore;
/// use mvvm_core::traits::{ReactiveStore, StoreBatch};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let store = MemoryStore::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// store.on_change("obj", Arc::new(move |_key, _value| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// {
///     let _batch = StoreBatch::open(&store);
///     store.set("obj", 1.into());
///     store.set("obj", 2.into());
///     store.mark_dirty("obj");
/// }
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// assert_eq!(store.get("obj"), Some(2.into()));
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys in the store
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of hooks registered on a key
    pub fn subscription_count(&self, key: &str) -> usize {
        self.inner.lock().hooks.get(key).map_or(0, Vec::len)
    }

    /// Total key notifications flushed so far
    ///
    /// Counts one per flushed dirty key, whether or not any hook listens.
    pub fn notification_count(&self) -> u64 {
        self.inner.lock().notifications
    }

    /// Remove every key and hook
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.values.clear();
        guard.hooks.clear();
        guard.dirty.clear();
    }

    fn flush_if_idle(&self) {
        let pending = {
            let mut guard = self.inner.lock();
            if guard.depth > 0 {
                return;
            }
            guard.take_pending()
        };
        dispatch(pending);
    }
}

fn dispatch(pending: Vec<(ChangeHandler, String, Value)>) {
    for (handler, key, value) in pending {
        trace!(key = %key, "dispatching store change");
        handler(&key, &value);
    }
}

impl ReactiveStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().values.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        {
            let mut guard = self.inner.lock();
            let changed = guard.values.get(key) != Some(&value);
            guard.values.insert(key.to_string(), value);
            if !changed {
                return;
            }
            guard.mark(key);
        }
        self.flush_if_idle();
    }

    fn setdefault(&self, key: &str, default: Value) -> Value {
        self.inner
            .lock()
            .values
            .entry(key.to_string())
            .or_insert(default)
            .clone()
    }

    fn mark_dirty(&self, key: &str) {
        self.inner.lock().mark(key);
        self.flush_if_idle();
    }

    fn on_change(&self, key: &str, handler: ChangeHandler) -> SubscriptionId {
        let mut guard = self.inner.lock();
        guard.next_id += 1;
        let id = SubscriptionId(guard.next_id);
        guard.hooks.entry(key.to_string()).or_default().push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self.inner.lock();
        let mut removed = false;
        guard.hooks.retain(|_, hooks| {
            let before = hooks.len();
            hooks.retain(|(hook_id, _)| *hook_id != id);
            removed |= hooks.len() != before;
            !hooks.is_empty()
        });
        removed
    }

    fn begin(&self) {
        let mut guard = self.inner.lock();
        guard.depth += 1;
        trace!(depth = guard.depth, "store batch opened");
    }

    fn commit(&self) {
        {
            let mut guard = self.inner.lock();
            guard.depth = guard.depth.saturating_sub(1);
            trace!(depth = guard.depth, "store batch committed");
        }
        self.flush_if_idle();
    }

    fn in_batch(&self) -> bool {
        self.inner.lock().depth > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreBatch;
    use serde_json::json;

    fn recorder(store: &MemoryStore, key: &str) -> (SubscriptionId, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.on_change(
            key,
            Arc::new(move |_key, value| {
                sink.lock().push(value.clone());
            }),
        );
        (id, seen)
    }

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();

        // Initially empty
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);

        store.set("a", json!(1));
        assert_eq!(store.get("a"), Some(json!(1)));
        assert_eq!(store.setdefault("a", json!(5)), json!(1));
        assert_eq!(store.setdefault("b", Value::Null), Value::Null);
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_unbatched_set_notifies_immediately() {
        let store = MemoryStore::new();
        let (_, seen) = recorder(&store, "k");

        store.set("k", json!("x"));
        store.set("k", json!("x")); // unchanged, no notification
        store.mark_dirty("k");
        assert_eq!(*seen.lock(), vec![json!("x"), json!("x")]);
    }

    #[test]
    fn test_batch_coalesces_to_final_value() {
        let store = MemoryStore::new();
        let (_, seen) = recorder(&store, "k");

        {
            let _outer = StoreBatch::open(&store);
            store.set("k", json!(1));
            {
                let _inner = StoreBatch::open(&store);
                store.set("k", json!(2));
                store.mark_dirty("k");
            }
            assert!(seen.lock().is_empty(), "inner commit must not flush");
            assert!(store.in_batch());
        }

        assert!(!store.in_batch());
        assert_eq!(*seen.lock(), vec![json!(2)]);
        assert_eq!(store.notification_count(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let store = MemoryStore::new();
        let (id, seen) = recorder(&store, "k");
        assert_eq!(store.subscription_count("k"), 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        assert_eq!(store.subscription_count("k"), 0);

        store.set("k", json!(1));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_hook_may_write_store() {
        let store = MemoryStore::new();
        let mirror = store.clone();
        store.on_change(
            "src",
            Arc::new(move |_key, value| {
                mirror.set("dst", value.clone());
            }),
        );
        let (_, seen) = recorder(&store, "dst");

        store.set("src", json!(7));
        assert_eq!(store.get("dst"), Some(json!(7)));
        assert_eq!(*seen.lock(), vec![json!(7)]);
    }
}
