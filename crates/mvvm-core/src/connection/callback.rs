//! Direct-callback connection
//!
//! Model-to-view pushes call a plain function. The view writes back by
//! calling the [`ViewHook`] returned from `connect` with `(key, value)`.
//! A hook stops accepting writes once its connection is torn down.

use super::BindingContext;
use crate::error::{Error, Result};
use crate::model::LinkedShape;
use crate::path::AttributePath;
use crate::update::UpdateResult;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Function receiving model-to-view pushes
pub type ViewCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Connection that talks to the view through a function
pub struct CallbackConnection {
    ctx: Arc<BindingContext>,
    binding_key: Option<String>,
    view: ViewCallback,
    /// Cleared by `teardown`; shared with every hook
    live: Arc<AtomicBool>,
}

impl CallbackConnection {
    pub(crate) fn new(ctx: Arc<BindingContext>, binding_key: Option<String>, view: ViewCallback) -> Self {
        Self {
            ctx,
            binding_key,
            view,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Binding key given at connect time
    pub fn binding_key(&self) -> Option<&str> {
        self.binding_key.as_deref()
    }

    /// Invoke the view callback with `value`
    pub fn update_in_view(&self, value: &Value) {
        (self.view)(value);
    }

    /// The hook the view calls to write into the model
    pub fn hook(&self) -> ViewHook {
        ViewHook {
            ctx: Arc::clone(&self.ctx),
            binding_key: self.binding_key.clone(),
            live: Arc::clone(&self.live),
        }
    }

    /// Detach every hook handed out by this connection
    pub(crate) fn teardown(&self) {
        self.live.store(false, Ordering::SeqCst);
        debug!(communicator = %self.ctx.communicator_id, "callback connection torn down");
    }
}

/// View-to-model entry point of a direct-callback connection
///
/// Cheap to clone; every clone writes into the same model.
#[derive(Clone)]
pub struct ViewHook {
    ctx: Arc<BindingContext>,
    binding_key: Option<String>,
    live: Arc<AtomicBool>,
}

impl ViewHook {
    /// Write `value` into the model at `key`
    ///
    /// `key` is an attribute path, optionally qualified with the binding
    /// key (`user.username`). An empty key, or the bare binding key,
    /// addresses the whole model.
    ///
    /// Validation rejections come back in [`UpdateResult::errored`];
    /// `Err` means the path could not be resolved or the model shape does
    /// not support the write. After the connection is torn down every
    /// call fails with [`Error::NotConnected`] and the model is untouched.
    pub fn call(&self, key: &str, value: Value) -> Result<UpdateResult> {
        if !self.is_live() {
            warn!(communicator = %self.ctx.communicator_id, key = key, "view hook called after disconnect");
            return Err(Error::NotConnected(self.ctx.communicator_id.clone()));
        }
        let path = self.resolve(key)?;
        if !path.is_root() {
            return self.ctx.apply_field(&path, value);
        }

        if self.ctx.model.shape() == LinkedShape::Object {
            return Err(Error::unsupported(
                "key is missing: an attribute-bearing object cannot be replaced through its view hook",
            ));
        }
        debug!(key = key, "view hook replacing whole model");
        self.ctx.apply_whole(value, self.binding_key.as_deref().unwrap_or(key))
    }

    /// Push a value for the whole model
    ///
    /// Shorthand for `call("", value)`.
    pub fn push(&self, value: Value) -> Result<UpdateResult> {
        self.call("", value)
    }

    /// Binding key this hook was created with
    pub fn binding_key(&self) -> Option<&str> {
        self.binding_key.as_deref()
    }

    /// Whether the connection that created this hook is still live
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn resolve(&self, key: &str) -> Result<AttributePath> {
        let Some(binding_key) = self.binding_key.as_deref() else {
            return AttributePath::parse(key);
        };
        if key == binding_key {
            return Ok(AttributePath::root());
        }
        match key.strip_prefix(binding_key).and_then(|rest| rest.strip_prefix('.')) {
            Some(rest) => AttributePath::parse(rest),
            None => AttributePath::parse(key),
        }
    }
}

impl fmt::Debug for ViewHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewHook")
            .field("communicator", &self.ctx.communicator_id)
            .field("binding_key", &self.binding_key)
            .field("live", &self.is_live())
            .finish()
    }
}
