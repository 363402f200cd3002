// # Store-Backed Connection
//
// Synchronizes a model with a ReactiveStore.
//
// ## Key layout
//
// - Tracked paths: one store key per path, `{binding_key}_{flattened path}`
//   (`user_ranges[1]_min_value`), or the flattened path alone without a
//   binding key.
// - No tracked paths: the whole model lives under the binding key.
//
// ## Directions
//
// - Model to view: `update_in_view` resolves every sub-value first, then
//   writes and marks every key inside one batch bracket, so each key
//   notifies once.
// - View to model: a change hook per key writes the new value through the
//   validation gate (per path) or replaces the whole model (untracked).
//
// Hooks cannot return errors; failures are logged and dropped.

use super::BindingContext;
use crate::config::BindingConfig;
use crate::error::Result;
use crate::path::{self, AttributePath};
use crate::traits::reactive_store::{ChangeHandler, ReactiveStore, StoreBatch, SubscriptionId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, trace};

/// Connection that talks to the view through store keys
pub struct StoreConnection {
    ctx: Arc<BindingContext>,
    store: Arc<dyn ReactiveStore>,
    config: Arc<BindingConfig>,
    binding_key: Option<String>,
    /// `(model path, store key)`; a single root entry when untracked
    targets: Vec<(AttributePath, String)>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    /// Set while this connection is writing into the store
    pushing: Arc<AtomicBool>,
}

impl StoreConnection {
    /// Declare the store keys and register change hooks on them
    pub(crate) fn connect(
        ctx: Arc<BindingContext>,
        store: Arc<dyn ReactiveStore>,
        config: Arc<BindingConfig>,
        binding_key: Option<String>,
    ) -> Self {
        let targets: Vec<(AttributePath, String)> = if ctx.tracked().is_empty() {
            vec![(AttributePath::root(), binding_key.clone().unwrap_or_default())]
        } else {
            ctx.tracked()
                .iter()
                .map(|path| (path.clone(), config.store_key(binding_key.as_deref(), path)))
                .collect()
        };

        let pushing = Arc::new(AtomicBool::new(false));
        let mut subscriptions = Vec::with_capacity(targets.len());
        for (path, key) in &targets {
            store.setdefault(key, Value::Null);
            let handler = change_handler(
                Arc::clone(&ctx),
                path.clone(),
                Arc::clone(&pushing),
                config.suppress_view_echo,
            );
            subscriptions.push(store.on_change(key, handler));
            trace!(communicator = %ctx.communicator_id, key = %key, "store key bound");
        }

        debug!(
            communicator = %ctx.communicator_id,
            binding_key = ?binding_key,
            keys = targets.len(),
            "store-backed connection active"
        );

        Self {
            ctx,
            store,
            config,
            binding_key,
            targets,
            subscriptions: Mutex::new(subscriptions),
            pushing,
        }
    }

    /// Binding key given at connect time
    pub fn binding_key(&self) -> Option<&str> {
        self.binding_key.as_deref()
    }

    /// Store keys this connection owns, in tracked-path order
    pub fn store_keys(&self) -> Vec<String> {
        self.targets.iter().map(|(_, key)| key.clone()).collect()
    }

    /// Write `value` (or its sub-value per tracked path) into the store
    ///
    /// Every path is resolved before anything is written; a resolution
    /// failure leaves the store untouched.
    pub fn update_in_view(&self, value: &Value) -> Result<()> {
        let mut writes = Vec::with_capacity(self.targets.len());
        for (path, key) in &self.targets {
            writes.push((key.as_str(), path::get(value, path)?.clone()));
        }

        let context = if tokio::runtime::Handle::try_current().is_ok() {
            "async"
        } else {
            "sync"
        };

        // Declared before the batch so notifications flush while engaged.
        let _echo = EchoGuard::engage(&self.pushing, self.config.suppress_view_echo);
        let _batch = if self.store.in_batch() {
            trace!(context = context, "joining open store batch");
            None
        } else {
            trace!(context = context, "opening store batch");
            Some(StoreBatch::open(self.store.as_ref()))
        };

        for (key, sub_value) in writes {
            self.store.set(key, sub_value);
            self.store.mark_dirty(key);
        }
        debug!(
            communicator = %self.ctx.communicator_id,
            keys = self.targets.len(),
            "pushed model to store"
        );
        Ok(())
    }

    /// Remove every change hook registered by this connection
    pub(crate) fn teardown(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for id in subscriptions {
            if !self.store.unsubscribe(id) {
                trace!(subscription = %id, "store hook already gone");
            }
        }
        debug!(communicator = %self.ctx.communicator_id, "store-backed connection torn down");
    }
}

fn change_handler(
    ctx: Arc<BindingContext>,
    path: AttributePath,
    pushing: Arc<AtomicBool>,
    suppress_echo: bool,
) -> ChangeHandler {
    Arc::new(move |key: &str, value: &Value| {
        if suppress_echo && pushing.load(Ordering::SeqCst) {
            trace!(key = key, "ignoring echo of own push");
            return;
        }
        let outcome = if path.is_root() {
            ctx.apply_whole(value.clone(), key)
        } else {
            ctx.apply_field(&path, value.clone())
        };
        if let Err(e) = outcome {
            error!(
                communicator = %ctx.communicator_id,
                key = key,
                "Failed to apply store change: {}",
                e
            );
        }
    })
}

/// Marks a connection as pushing until dropped
struct EchoGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
    engaged: bool,
}

impl<'a> EchoGuard<'a> {
    fn engage(flag: &'a AtomicBool, enabled: bool) -> Self {
        let previous = if enabled {
            flag.swap(true, Ordering::SeqCst)
        } else {
            flag.load(Ordering::SeqCst)
        };
        Self {
            flag,
            previous,
            engaged: enabled,
        }
    }
}

impl Drop for EchoGuard<'_> {
    fn drop(&mut self) {
        if self.engaged {
            self.flag.store(self.previous, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SharedModel;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn connect(model: SharedModel, tracked: &[&str], key: Option<&str>) -> (StoreConnection, MemoryStore) {
        let store = MemoryStore::new();
        let ctx = Arc::new(BindingContext::new(
            "test".into(),
            model,
            tracked.iter().map(|p| AttributePath::parse(p).unwrap()).collect(),
            None,
        ));
        let connection = StoreConnection::connect(
            ctx,
            Arc::new(store.clone()),
            Arc::new(BindingConfig::default()),
            key.map(str::to_string),
        );
        (connection, store)
    }

    #[test]
    fn test_connect_declares_keys() {
        let model = SharedModel::object(json!({"a": {"b": 1}, "c": 2}));
        let (connection, store) = connect(model, &["a.b", "c"], Some("obj"));

        assert_eq!(connection.store_keys(), vec!["obj_a_b".to_string(), "obj_c".to_string()]);
        assert_eq!(store.get("obj_a_b"), Some(Value::Null));
        assert_eq!(store.subscription_count("obj_c"), 1);
    }

    #[test]
    fn test_store_change_writes_model() {
        let model = SharedModel::object(json!({"a": {"b": 1}}));
        let (_connection, store) = connect(model.clone(), &["a.b"], Some("obj"));

        store.set("obj_a_b", json!(5));
        assert_eq!(model.get("a.b").unwrap(), json!(5));
    }

    #[test]
    fn test_push_is_not_echoed_into_model() {
        let model = SharedModel::object(json!({"a": 1}));
        let (connection, store) = connect(model.clone(), &["a"], Some("obj"));

        connection.update_in_view(&json!({"a": 9})).unwrap();
        assert_eq!(store.get("obj_a"), Some(json!(9)));
        assert_eq!(model.get("a").unwrap(), json!(1));
        assert_eq!(store.notification_count(), 1);
    }

    #[test]
    fn test_unresolvable_push_writes_nothing() {
        let model = SharedModel::object(json!({"a": 1, "b": 2}));
        let (connection, store) = connect(model, &["a", "b"], Some("obj"));

        assert!(connection.update_in_view(&json!({"a": 3})).is_err());
        assert_eq!(store.get("obj_a"), Some(Value::Null));
    }

    #[test]
    fn test_teardown_unsubscribes() {
        let model = SharedModel::object(json!({"a": 1}));
        let (connection, store) = connect(model.clone(), &["a"], Some("obj"));

        connection.teardown();
        assert_eq!(store.subscription_count("obj_a"), 0);
        store.set("obj_a", json!(2));
        assert_eq!(model.get("a").unwrap(), json!(1));
    }

    #[test]
    fn test_echo_guard_restores_flag() {
        let flag = AtomicBool::new(false);
        {
            let _guard = EchoGuard::engage(&flag, true);
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));

        let _guard = EchoGuard::engage(&flag, false);
        assert!(!flag.load(Ordering::SeqCst));
    }
}
