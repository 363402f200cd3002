//! Binding registry
//!
//! The registry maps identifiers to communicators. It keeps two tables:
//!
//! - **Communicators**, by the ULID assigned at construction time
//! - **Binding keys**, claimed by `connect` and released by `disconnect`
//!
//! Binding keys are unique: a key held by a live connection cannot be
//! claimed again until it is released. View code uses the key table for
//! out-of-band lookups by fully qualified name (`{binding_key}.{path}`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mvvm_core::registry::BindingRegistry;
//!
//! let registry = Arc::new(BindingRegistry::new());
//! let binding = Binding::new(store, registry.clone());
//!
//! let communicator = binding.new_bind(model, &[], None)?;
//! communicator.connect("user")?;
//!
//! let info = registry.field_info("user.username")?;
//! ```
//!
//! ## Lifecycle
//!
//! Entries are only removed by explicit calls ([`BindingRegistry::unregister`],
//! [`BindingRegistry::clear`], or a communicator's `disconnect`). Removing a
//! communicator's entry also tears down its connection. Independent
//! sessions (test cases, for instance) should use their own registry or
//! clear it in between.

use crate::communicator::Communicator;
use crate::error::{Error, Result};
use crate::schema::FieldInfo;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Registry of communicators and their binding keys
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Lookups clone the communicator handle out of
/// the table, so no registry lock is held while a communicator runs.
#[derive(Default)]
pub struct BindingRegistry {
    /// Communicators by construction-time identifier
    communicators: RwLock<HashMap<String, Communicator>>,

    /// Communicators by claimed binding key
    keys: RwLock<HashMap<String, Communicator>>,
}

impl BindingRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a communicator under its identifier
    pub fn register(&self, communicator: &Communicator) {
        self.communicators
            .write()
            .insert(communicator.id().to_string(), communicator.clone());
    }

    /// Remove a communicator and every binding key it holds
    ///
    /// The communicator's live connection is torn down, so its store hooks
    /// and view hook stop writing into the model. Returns `true` if the
    /// communicator was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let registered = self.communicators.write().remove(id);
        let removed = registered.is_some();
        let mut dropped: Vec<Communicator> = registered.into_iter().collect();
        self.keys.write().retain(|_, holder| {
            if holder.id() == id {
                dropped.push(holder.clone());
                false
            } else {
                true
            }
        });

        for communicator in dropped {
            communicator.teardown_connection();
        }
        if removed {
            debug!(communicator = id, "communicator unregistered");
        }
        removed
    }

    /// Claim `key` for `communicator`
    ///
    /// Fails with [`Error::DuplicateBinding`] if any communicator, including
    /// this one, already holds the key.
    pub fn claim_key(&self, key: &str, communicator: &Communicator) -> Result<()> {
        let mut keys = self.keys.write();
        if let Some(holder) = keys.get(key) {
            debug!(key = key, holder = holder.id(), "binding key already claimed");
            return Err(Error::duplicate_binding(key));
        }
        keys.insert(key.to_string(), communicator.clone());
        Ok(())
    }

    /// Release `key` if it is held by the communicator `id`
    pub fn release_key(&self, key: &str, id: &str) -> bool {
        let mut keys = self.keys.write();
        match keys.get(key) {
            Some(holder) if holder.id() == id => {
                keys.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Remove every communicator and binding key
    ///
    /// Every live connection is torn down after the tables are emptied.
    pub fn clear(&self) {
        let communicators = std::mem::take(&mut *self.communicators.write());
        let keys = std::mem::take(&mut *self.keys.write());

        let count = communicators.len();
        for communicator in communicators.into_values().chain(keys.into_values()) {
            communicator.teardown_connection();
        }
        debug!(communicators = count, "registry cleared");
    }

    /// Communicator by identifier
    pub fn get(&self, id: &str) -> Option<Communicator> {
        self.communicators.read().get(id).cloned()
    }

    /// Communicator holding a binding key
    pub fn lookup(&self, key: &str) -> Result<Communicator> {
        self.keys
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::binding_not_found(key))
    }

    /// Field metadata by fully qualified name (`{binding_key}.{path}`)
    ///
    /// # Returns
    ///
    /// - `Ok(FieldInfo)`: metadata for the field
    /// - `Err(Error::BindingNotFound)`: no binding holds the key
    /// - `Err(Error::FieldNotFound)`: the model has no metadata for the path
    pub fn field_info(&self, qualified_name: &str) -> Result<FieldInfo> {
        let (key, path) = split_qualified(qualified_name);
        let communicator = self.lookup(key)?;
        communicator.field_info(path)
    }

    /// Check a value for a field without writing it
    ///
    /// Returns the validation message the write would produce, or `None`
    /// when it would be accepted. An unknown binding is logged and treated
    /// as "nothing to say".
    pub fn validate_parameter(&self, qualified_name: &str, value: Value) -> Result<Option<String>> {
        let (key, path) = split_qualified(qualified_name);
        let communicator = match self.lookup(key) {
            Ok(communicator) => communicator,
            Err(_) => {
                warn!("Cannot find binding for '{}', skipping validation", qualified_name);
                return Ok(None);
            }
        };
        communicator.validate_parameter(path, value)
    }

    /// List all claimed binding keys, sorted
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Check if a binding key is claimed
    pub fn has_key(&self, key: &str) -> bool {
        self.keys.read().contains_key(key)
    }

    /// Check if a communicator is registered
    pub fn has_id(&self, id: &str) -> bool {
        self.communicators.read().contains_key(id)
    }

    /// Number of registered communicators
    pub fn len(&self) -> usize {
        self.communicators.read().len()
    }

    /// Whether no communicator is registered
    pub fn is_empty(&self) -> bool {
        self.communicators.read().is_empty()
    }
}

/// Split `user.ranges[0].min_value` into `("user", "ranges[0].min_value")`
fn split_qualified(name: &str) -> (&str, &str) {
    name.split_once('.').unwrap_or((name, ""))
}
