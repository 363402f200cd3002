// # Reactive Store Trait
//
// Defines the interface of the view-side state store.
//
// ## Purpose
//
// A reactive store is the keyed state a UI framework renders from. The
// binding engine writes model values into it and listens on its keys for
// changes made by the view.
//
// ## Implementations
//
// - In-process: `MemoryStore` (tests, embedding, headless use)
// - Framework adapters: implement this trait over the framework's state
//
// ## Usage
//
// ```rust,ignore
// use mvvm_core::traits::{ReactiveStore, StoreBatch};
//
// let store = /* ReactiveStore implementation */;
//
// // Coalesce two writes into a single notification per key
// {
//     let _batch = StoreBatch::open(&store);
//     store.set("user_username", "aa".into());
//     store.mark_dirty("user_username");
// } // hooks fire here
// ```

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Handler invoked with `(key, new_value)` when a watched key changes
pub type ChangeHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Identifies one registered change hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Trait for reactive store implementations
///
/// # Notification semantics
///
/// - Outside a batch, a `set` that changes a value, or an explicit
///   `mark_dirty`, notifies the key's hooks immediately.
/// - Inside a batch (`begin` .. `commit`, nestable), keys are collected and
///   each dirty key notifies its hooks exactly once, with its final value,
///   when the outermost batch commits.
///
/// # Reentrancy
///
/// Implementations must not hold internal locks while invoking hooks. A
/// hook may read and write the store, open batches, and register hooks.
///
/// # Thread Safety
///
/// All methods must be safe to call from any thread and from inside a
/// running async runtime.
pub trait ReactiveStore: Send + Sync {
    /// Current value of a key
    fn get(&self, key: &str) -> Option<Value>;

    /// Set a key's value
    fn set(&self, key: &str, value: Value);

    /// Insert `default` if the key is absent; returns the resulting value
    ///
    /// Never notifies. Frameworks that only watch declared keys need this
    /// before a hook can be registered.
    fn setdefault(&self, key: &str, default: Value) -> Value;

    /// Force change notification for a key
    fn mark_dirty(&self, key: &str);

    /// Register a change hook for a key
    fn on_change(&self, key: &str, handler: ChangeHandler) -> SubscriptionId;

    /// Remove a change hook
    ///
    /// Returns `true` if the hook existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Open a batching bracket
    fn begin(&self);

    /// Close a batching bracket, flushing notifications at depth zero
    fn commit(&self);

    /// Whether a batching bracket is currently open
    fn in_batch(&self) -> bool;
}

/// RAII batching bracket
///
/// Calls [`ReactiveStore::begin`] on creation and
/// [`ReactiveStore::commit`] on drop, so the bracket closes even when the
/// enclosing code returns early.
pub struct StoreBatch<'a> {
    store: &'a dyn ReactiveStore,
}

impl<'a> StoreBatch<'a> {
    /// Open a bracket on `store`
    pub fn open(store: &'a dyn ReactiveStore) -> Self {
        store.begin();
        Self { store }
    }
}

impl Drop for StoreBatch<'_> {
    fn drop(&mut self) {
        self.store.commit();
    }
}
