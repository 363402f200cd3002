//! Communicator: the central binding object
//!
//! A communicator is responsible for:
//! - Holding the linked object, its tracked paths and the post-update callback
//! - Creating the connection to the view on [`Communicator::connect`]
//! - Pushing model values to the view ([`Communicator::update_in_view`])
//! - Bulk model replacement with change reporting
//!
//! ## Architecture
//!
//! ```text
//!                       ┌────────────────┐
//!     Binding ─────────▶│  Communicator  │◀──── BindingRegistry
//!    (factory)          └────────────────┘      (id + binding key)
//!                               │
//!                  connect(target)
//!                               │
//!            ┌──────────────────┴──────────────────┐
//!            ▼                                     ▼
//!  ┌───────────────────┐                 ┌───────────────────┐
//!  │ CallbackConnection│                 │  StoreConnection  │
//!  │ (ViewHook)        │                 │  (ReactiveStore)  │
//!  └───────────────────┘                 └───────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. Create with [`Binding::new_bind()`]; the communicator is registered
//!    under a fresh identifier right away
//! 2. Call [`Communicator::connect()`] with a binding key or a callback
//! 3. Drive updates in either direction
//! 4. [`Communicator::disconnect()`] releases the key and store hooks;
//!    [`BindingRegistry::unregister`] and [`BindingRegistry::clear`] tear
//!    the connection down as well

use crate::config::BindingConfig;
use crate::connection::{BindingContext, CallbackConnection, ConnectTarget, Connection, StoreConnection, ViewHook};
use crate::error::{Error, Result};
use crate::model::{LinkedObject, LinkedShape, SharedModel};
use crate::path::{self, AttributePath};
use crate::registry::BindingRegistry;
use crate::schema::FieldInfo;
use crate::traits::ReactiveStore;
use crate::update::{UpdateCallback, UpdateResult};
use crate::validator::{self, StagedWrite};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use ulid::Ulid;

/// Factory for communicators sharing one store, registry and config
///
/// # Example
///
/// ```rust
/// use mvvm_core::{Binding, BindingRegistry, ConnectTarget, SharedModel};
/// use mvvm_core::store::MemoryStore;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # fn main() -> mvvm_core::Result<()> {
/// let binding = Binding::new(Arc::new(MemoryStore::new()), Arc::new(BindingRegistry::new()));
/// let model = SharedModel::object(json!({"username": "test_name"}));
/// let communicator = binding.new_bind(model.clone(), &[], None)?;
///
/// let hook = communicator
///     .connect(ConnectTarget::callback(|_value| {}))?
///     .expect("callback connections return a hook");
/// let result = hook.call("username", json!("aa"))?;
///
/// assert!(result.updated.contains("username"));
/// assert_eq!(model.get("username")?, json!("aa"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Binding {
    store: Arc<dyn ReactiveStore>,
    registry: Arc<BindingRegistry>,
    config: Arc<BindingConfig>,
}

impl Binding {
    /// Create a factory with the default configuration
    pub fn new(store: Arc<dyn ReactiveStore>, registry: Arc<BindingRegistry>) -> Self {
        Self {
            store,
            registry,
            config: Arc::new(BindingConfig::default()),
        }
    }

    /// Create a factory with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_config(
        store: Arc<dyn ReactiveStore>,
        registry: Arc<BindingRegistry>,
        config: BindingConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            registry,
            config: Arc::new(config),
        })
    }

    /// Create a communicator for `model`
    ///
    /// # Parameters
    ///
    /// - `model`: the linked object
    /// - `tracked`: attribute paths to synchronize individually; empty means
    ///   the whole model (an attribute-bearing object derives its leaf paths)
    /// - `callback`: invoked with the [`UpdateResult`] of every view-to-model
    ///   update
    pub fn new_bind(
        &self,
        model: SharedModel,
        tracked: &[&str],
        callback: Option<UpdateCallback>,
    ) -> Result<Communicator> {
        Communicator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            model,
            tracked,
            callback,
        )
    }

    /// The shared store
    pub fn store(&self) -> &Arc<dyn ReactiveStore> {
        &self.store
    }

    /// The shared registry
    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    /// The shared configuration
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }
}

struct Inner {
    id: String,
    ctx: Arc<BindingContext>,
    store: Arc<dyn ReactiveStore>,
    registry: Arc<BindingRegistry>,
    config: Arc<BindingConfig>,
    connection: Mutex<Option<Arc<Connection>>>,
}

/// Binding object between one linked object and its view
///
/// Cloning shares the communicator. A communicator holds at most one live
/// connection; the connection never outlives it or its registry entry.
#[derive(Clone)]
pub struct Communicator {
    inner: Arc<Inner>,
}

impl Communicator {
    /// Create and register a communicator
    ///
    /// Usually called through [`Binding::new_bind`].
    pub fn new(
        store: Arc<dyn ReactiveStore>,
        registry: Arc<BindingRegistry>,
        config: Arc<BindingConfig>,
        model: SharedModel,
        tracked: &[&str],
        callback: Option<UpdateCallback>,
    ) -> Result<Self> {
        let mut paths = tracked
            .iter()
            .map(|raw| AttributePath::parse(raw))
            .collect::<Result<Vec<_>>>()?;

        if paths.is_empty() && model.shape() == LinkedShape::Object {
            if let Some(snapshot) = model.snapshot() {
                paths = path::nested_attributes(&snapshot);
            }
        }

        let id = Ulid::new().to_string();
        let communicator = Self {
            inner: Arc::new(Inner {
                id: id.clone(),
                ctx: Arc::new(BindingContext::new(id.clone(), model, paths, callback)),
                store,
                registry,
                config,
                connection: Mutex::new(None),
            }),
        };
        communicator.inner.registry.register(&communicator);

        debug!(
            communicator = %id,
            shape = %communicator.inner.ctx.model.shape(),
            tracked = communicator.inner.ctx.tracked().len(),
            "communicator registered"
        );
        Ok(communicator)
    }

    /// Construction-time identifier in the registry
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Binding key of the live connection
    pub fn binding_key(&self) -> Option<String> {
        self.connection()
            .and_then(|connection| connection.binding_key().map(str::to_string))
    }

    /// The linked object handle
    pub fn model(&self) -> &SharedModel {
        &self.inner.ctx.model
    }

    /// Tracked paths (explicit or derived)
    pub fn tracked_paths(&self) -> &[AttributePath] {
        self.inner.ctx.tracked()
    }

    /// Whether a connection is live
    pub fn is_connected(&self) -> bool {
        self.inner.connection.lock().is_some()
    }

    fn connection(&self) -> Option<Arc<Connection>> {
        self.inner.connection.lock().clone()
    }

    /// Connect the communicator to its view
    ///
    /// - A [`ConnectTarget::Callback`] creates a direct-callback connection
    ///   and returns its [`ViewHook`].
    /// - A string key (or [`ConnectTarget::detached`]) creates a
    ///   store-backed connection and returns `None`.
    ///
    /// Connecting again replaces the previous connection.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateBinding`] if the key is held by a live
    ///   connection, this communicator's included; the existing connection
    ///   stays active
    /// - [`Error::UnsupportedLinkedObject`] for a callable model with
    ///   tracked paths
    pub fn connect(&self, target: impl Into<ConnectTarget>) -> Result<Option<ViewHook>> {
        let target = target.into();
        let ctx = &self.inner.ctx;

        if ctx.model.shape() == LinkedShape::Callable && !ctx.tracked().is_empty() {
            return Err(Error::unsupported(
                "a callable sink has no attributes to track",
            ));
        }

        if let Some(key) = target.key() {
            self.inner.registry.claim_key(key, self)?;
        }

        let previous = self.inner.connection.lock().take();
        if let Some(previous) = previous {
            previous.teardown();
            if let Some(old_key) = previous.binding_key() {
                self.inner.registry.release_key(old_key, self.id());
            }
            debug!(communicator = %self.id(), "previous connection replaced");
        }

        let connection = match target {
            ConnectTarget::Callback { key, view } => {
                Connection::Callback(CallbackConnection::new(Arc::clone(ctx), key, view))
            }
            ConnectTarget::Store(key) => Connection::Store(StoreConnection::connect(
                Arc::clone(ctx),
                Arc::clone(&self.inner.store),
                Arc::clone(&self.inner.config),
                key,
            )),
        };
        let hook = connection.hook();
        let kind = if hook.is_some() { "callback" } else { "store" };

        info!(
            communicator = %self.id(),
            binding_key = ?connection.binding_key(),
            kind = kind,
            "connected"
        );
        *self.inner.connection.lock() = Some(Arc::new(connection));
        Ok(hook)
    }

    /// Tear down the live connection
    ///
    /// Releases the binding key and removes store hooks. Returns `false` if
    /// nothing was connected.
    pub fn disconnect(&self) -> bool {
        let Some(connection) = self.take_connection() else {
            return false;
        };
        if let Some(key) = connection.binding_key() {
            self.inner.registry.release_key(key, self.id());
        }
        info!(communicator = %self.id(), "disconnected");
        true
    }

    /// Tear down the live connection without touching the registry
    ///
    /// Used by the registry when it drops this communicator's entries; the
    /// caller must not hold a registry lock.
    pub(crate) fn teardown_connection(&self) -> bool {
        let torn_down = self.take_connection().is_some();
        if torn_down {
            info!(communicator = %self.id(), "connection dropped with registry entry");
        }
        torn_down
    }

    fn take_connection(&self) -> Option<Arc<Connection>> {
        let connection = self.inner.connection.lock().take()?;
        connection.teardown();
        Some(connection)
    }

    /// Push `value` to the view
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before `connect`
    /// - [`Error::PathResolution`] if a tracked path is missing from `value`
    pub fn update_in_view<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let connection = self
            .connection()
            .ok_or_else(|| Error::NotConnected(self.id().to_string()))?;
        connection.update_in_view(&value)
    }

    /// Push the current model to the view
    pub fn refresh_view(&self) -> Result<()> {
        let snapshot = self
            .model()
            .snapshot()
            .ok_or_else(|| Error::unsupported("a callable sink has no value to show"))?;
        self.update_in_view(&snapshot)
    }

    /// Replace the whole model and report what changed
    ///
    /// Records validate the complete new instance first; a failure keeps
    /// the old model and reports the binding key as errored. The
    /// post-update callback is invoked with the result.
    pub fn replace_model(&self, value: Value) -> Result<UpdateResult> {
        let report_as = self.binding_key().unwrap_or_default();
        self.inner.ctx.apply_whole(value, &report_as)
    }

    /// Metadata for a field of a record model
    pub fn field_info(&self, path: &str) -> Result<FieldInfo> {
        let path = AttributePath::parse(path)?;
        self.model().with(|object| match object {
            LinkedObject::Record(record) => validator::field_info(record.schema().as_ref(), &path),
            _ => Err(Error::field_not_found(path.to_string())),
        })
    }

    /// Validate a value for a field without writing it
    ///
    /// Returns the message the write would be rejected with. Models without
    /// a schema accept everything.
    pub fn validate_parameter(&self, path: &str, value: Value) -> Result<Option<String>> {
        let path = AttributePath::parse(path)?;
        self.model().with(|object| match object {
            LinkedObject::Record(record) => {
                match validator::stage_candidate(record.schema().as_ref(), record.value(), &path, value)? {
                    StagedWrite::Accepted(_) => Ok(None),
                    StagedWrite::Rejected(rejection) => Ok(Some(rejection.message)),
                }
            }
            _ => Ok(None),
        })
    }

    /// Store keys of the live connection
    pub fn store_keys(&self) -> Vec<String> {
        self.connection()
            .map(|connection| connection.store_keys())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("id", &self.inner.id)
            .field("tracked", &self.inner.ctx.tracked())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn binding() -> Binding {
        Binding::new(Arc::new(MemoryStore::new()), Arc::new(BindingRegistry::new()))
    }

    #[test]
    fn test_object_shape_derives_paths() {
        let model = SharedModel::object(json!({"a": {"b": 1}, "_private": 2, "c": [1, 2]}));
        let communicator = binding().new_bind(model, &[], None).unwrap();
        let tracked: Vec<String> = communicator.tracked_paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(tracked, vec!["a.b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_invalid_tracked_path() {
        let err = binding()
            .new_bind(SharedModel::object(json!({})), &["a[x]"], None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_update_before_connect() {
        let communicator = binding().new_bind(SharedModel::object(json!({})), &[], None).unwrap();
        assert!(matches!(communicator.update_in_view(&json!({})), Err(Error::NotConnected(_))));
    }

    #[test]
    fn test_callable_with_tracked_paths_is_rejected() {
        let communicator = binding()
            .new_bind(SharedModel::callable(|_| {}), &["a"], None)
            .unwrap();
        let err = communicator.connect("sink").unwrap_err();
        assert!(matches!(err, Error::UnsupportedLinkedObject(_)));
        assert!(!communicator.is_connected());
    }

    #[test]
    fn test_reconnect_with_new_key_releases_old() {
        let binding = binding();
        let communicator = binding.new_bind(SharedModel::object(json!({"a": 1})), &[], None).unwrap();
        communicator.connect("first").unwrap();
        communicator.connect("second").unwrap();

        assert_eq!(communicator.binding_key().as_deref(), Some("second"));
        assert!(!binding.registry().has_key("first"));
        assert!(binding.registry().has_key("second"));
    }

    #[test]
    fn test_with_config_validates() {
        let mut config = BindingConfig::default();
        config.key_separator.clear();
        let result = Binding::with_config(
            Arc::new(MemoryStore::new()),
            Arc::new(BindingRegistry::new()),
            config,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
