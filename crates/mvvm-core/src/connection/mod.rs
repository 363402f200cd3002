//! Connections between a communicator and its view
//!
//! A connection is the strategy created by [`Communicator::connect`]. Two
//! variants exist:
//!
//! - **Direct-callback** ([`CallbackConnection`]): the model is pushed to
//!   the view through a plain function; the view pushes back by invoking
//!   the returned [`ViewHook`].
//! - **Store-backed** ([`StoreConnection`]): both directions go through
//!   keys of a [`ReactiveStore`](crate::traits::ReactiveStore).
//!
//! ## Update flow
//!
//! ```text
//!        update_in_view                      view hook / store change
//! model ───────────────▶ view        view ───────────────────────────▶ model
//!                                                    │
//!                                  ┌─────────────────┴────────────────┐
//!                                  │ record: stage + validate + commit│
//!                                  │ other shapes: direct write       │
//!                                  └─────────────────┬────────────────┘
//!                                                    ▼
//!                                     post-update callback(UpdateResult)
//! ```
//!
//! Both variants share the apply logic in [`BindingContext`].
//!
//! [`Communicator::connect`]: crate::communicator::Communicator::connect

pub mod callback;
pub mod store_backed;

pub use callback::{CallbackConnection, ViewCallback, ViewHook};
pub use store_backed::StoreConnection;

use crate::diff::{self, ChangedPath};
use crate::error::{Error, Result};
use crate::model::{LinkedObject, ModelSink, SharedModel};
use crate::path::{self, AttributePath};
use crate::update::{UpdateCallback, UpdateResult};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// What `connect` should bind to
pub enum ConnectTarget {
    /// Store-backed connection, optionally under a binding key
    Store(Option<String>),
    /// Direct-callback connection
    Callback {
        /// Optional binding key, used for metadata lookups and to strip a
        /// `{key}.` prefix from paths passed to the view hook
        key: Option<String>,
        /// Receives every model-to-view push
        view: ViewCallback,
    },
}

impl ConnectTarget {
    /// Store-backed connection without a binding key
    pub fn detached() -> Self {
        Self::Store(None)
    }

    /// Direct-callback connection
    pub fn callback<F>(view: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self::Callback {
            key: None,
            view: Arc::new(view),
        }
    }

    /// Direct-callback connection registered under `key`
    pub fn keyed_callback<F>(key: impl Into<String>, view: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self::Callback {
            key: Some(key.into()),
            view: Arc::new(view),
        }
    }

    /// The binding key, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            ConnectTarget::Store(key) => key.as_deref(),
            ConnectTarget::Callback { key, .. } => key.as_deref(),
        }
    }
}

impl From<&str> for ConnectTarget {
    fn from(key: &str) -> Self {
        Self::Store(Some(key.to_string()))
    }
}

impl From<String> for ConnectTarget {
    fn from(key: String) -> Self {
        Self::Store(Some(key))
    }
}

impl From<Option<String>> for ConnectTarget {
    fn from(key: Option<String>) -> Self {
        Self::Store(key)
    }
}

/// State a connection shares with its communicator
///
/// Holds the linked object handle, tracked paths and post-update callback.
pub struct BindingContext {
    pub(crate) communicator_id: String,
    pub(crate) model: SharedModel,
    pub(crate) tracked: Vec<AttributePath>,
    pub(crate) callback: Option<UpdateCallback>,
}

enum FieldStep {
    Done(UpdateResult),
    Sink(ModelSink, Value),
}

enum WholeStep {
    Changed(BTreeSet<ChangedPath>),
    Rejected(String),
    Sink(ModelSink, Value),
}

impl BindingContext {
    pub(crate) fn new(
        communicator_id: String,
        model: SharedModel,
        tracked: Vec<AttributePath>,
        callback: Option<UpdateCallback>,
    ) -> Self {
        Self {
            communicator_id,
            model,
            tracked,
            callback,
        }
    }

    /// Tracked paths of the owning communicator
    pub fn tracked(&self) -> &[AttributePath] {
        &self.tracked
    }

    fn notify(&self, result: &UpdateResult) {
        if let Some(callback) = &self.callback {
            callback(result);
        }
    }

    /// Write one value from the view into the model at `path`
    ///
    /// Records are validation-gated; rejections are reported in the result,
    /// never as `Err`.
    pub(crate) fn apply_field(&self, path: &AttributePath, value: Value) -> Result<UpdateResult> {
        let step = self.model.with(|object| -> Result<FieldStep> {
            match object {
                LinkedObject::Record(record) => {
                    let result = match record.validate_candidate(path, value)? {
                        None => UpdateResult::updated(path.to_string()),
                        Some(rejection) => {
                            UpdateResult::errored(rejection.field.to_string(), rejection.message)
                        }
                    };
                    Ok(FieldStep::Done(result))
                }
                LinkedObject::Mapping(map) => {
                    with_mapping_value(map, |root| path::set(root, path, value))?;
                    Ok(FieldStep::Done(UpdateResult::updated(path.to_string())))
                }
                LinkedObject::Object(root) => {
                    path::set(root, path, value)?;
                    Ok(FieldStep::Done(UpdateResult::updated(path.to_string())))
                }
                LinkedObject::Callable(sink) => Ok(FieldStep::Sink(Arc::clone(sink), value)),
            }
        })?;

        let result = match step {
            FieldStep::Done(result) => result,
            FieldStep::Sink(sink, value) => {
                sink(value);
                UpdateResult::updated(path.to_string())
            }
        };

        debug!(
            communicator = %self.communicator_id,
            path = %path,
            updated = result.updated.len(),
            errored = result.errored.len(),
            "applied view change"
        );
        self.notify(&result);
        Ok(result)
    }

    /// Replace the whole model with a payload from the view
    ///
    /// Records validate the full reconstructed instance; on success the
    /// changed paths (via diff) are reported as updated, on failure
    /// `report_as` is reported as errored and the old model is kept.
    /// Mappings are merged, objects replaced, sinks invoked.
    pub(crate) fn apply_whole(&self, payload: Value, report_as: &str) -> Result<UpdateResult> {
        let step = self.model.with(|object| -> Result<WholeStep> {
            match object {
                LinkedObject::Record(record) => match record.validate_replacement(&payload) {
                    Ok(validated) => {
                        let changes = diff::diff(record.value(), &validated);
                        record.commit(validated);
                        Ok(WholeStep::Changed(changes))
                    }
                    Err(errors) => Ok(WholeStep::Rejected(errors.to_string())),
                },
                LinkedObject::Mapping(map) => {
                    let Value::Object(incoming) = payload else {
                        return Err(Error::unsupported("a mapping can only be updated from an object payload"));
                    };
                    let before = Value::Object(map.clone());
                    map.extend(incoming);
                    Ok(WholeStep::Changed(diff::diff(&before, &Value::Object(map.clone()))))
                }
                LinkedObject::Object(root) => {
                    if !payload.is_object() {
                        return Err(Error::unsupported("an object can only be replaced by an object payload"));
                    }
                    let changes = diff::diff(root, &payload);
                    *root = payload;
                    Ok(WholeStep::Changed(changes))
                }
                LinkedObject::Callable(sink) => Ok(WholeStep::Sink(Arc::clone(sink), payload)),
            }
        })?;

        let result = match step {
            WholeStep::Changed(changes) => self.report_changes(&changes),
            WholeStep::Rejected(message) => {
                debug!(
                    communicator = %self.communicator_id,
                    key = report_as,
                    "rejected whole-model update: {}",
                    message
                );
                UpdateResult::errored(report_as, message)
            }
            WholeStep::Sink(sink, payload) => {
                sink(payload);
                if report_as.is_empty() {
                    UpdateResult::new()
                } else {
                    UpdateResult::updated(report_as)
                }
            }
        };

        self.notify(&result);
        Ok(result)
    }

    /// Turn diff output into an update result
    ///
    /// Without tracked paths every changed path is reported; otherwise only
    /// the tracked paths a change affects.
    fn report_changes(&self, changes: &BTreeSet<ChangedPath>) -> UpdateResult {
        let mut result = UpdateResult::new();
        if self.tracked.is_empty() {
            for change in changes {
                result.mark_updated(change.path.to_string());
            }
        } else {
            for tracked in &self.tracked {
                if changes.iter().any(|change| change.affects(tracked)) {
                    result.mark_updated(tracked.to_string());
                }
            }
        }
        result
    }
}

/// Run a path operation on a mapping as if it were an object value
fn with_mapping_value<R>(
    map: &mut Map<String, Value>,
    f: impl FnOnce(&mut Value) -> Result<R>,
) -> Result<R> {
    let mut wrapped = Value::Object(std::mem::take(map));
    let out = f(&mut wrapped);
    if let Value::Object(restored) = wrapped {
        *map = restored;
    }
    out
}

/// A live connection
pub enum Connection {
    /// Direct-callback variant
    Callback(CallbackConnection),
    /// Store-backed variant
    Store(StoreConnection),
}

impl Connection {
    /// Binding key the connection was created with
    pub fn binding_key(&self) -> Option<&str> {
        match self {
            Connection::Callback(connection) => connection.binding_key(),
            Connection::Store(connection) => connection.binding_key(),
        }
    }

    /// Push a model value to the view side
    pub fn update_in_view(&self, value: &Value) -> Result<()> {
        match self {
            Connection::Callback(connection) => {
                connection.update_in_view(value);
                Ok(())
            }
            Connection::Store(connection) => connection.update_in_view(value),
        }
    }

    /// The view hook, for direct-callback connections
    pub fn hook(&self) -> Option<ViewHook> {
        match self {
            Connection::Callback(connection) => Some(connection.hook()),
            Connection::Store(_) => None,
        }
    }

    /// Store keys this connection reads and writes
    pub fn store_keys(&self) -> Vec<String> {
        match self {
            Connection::Callback(_) => Vec::new(),
            Connection::Store(connection) => connection.store_keys(),
        }
    }

    /// Release store subscriptions and detach view hooks
    pub(crate) fn teardown(&self) {
        match self {
            Connection::Callback(connection) => connection.teardown(),
            Connection::Store(connection) => connection.teardown(),
        }
    }
}
