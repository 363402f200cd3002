//! Test fixtures and common utilities for binding contract tests
//!
//! This module provides a typed `User` view-model with the validation rules
//! the contract tests rely on, a fixture bundling a store with a registry,
//! and a recorder for post-update callbacks.

#![allow(dead_code)]

use mvvm_core::path::AttributePath;
use mvvm_core::schema::{FieldError, FieldInfo, ViewModel};
use mvvm_core::store::MemoryStore;
use mvvm_core::update::{UpdateCallback, UpdateResult, callback};
use mvvm_core::{Binding, BindingConfig, BindingRegistry, SharedModel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An ordered numeric range; `min_value` must be lower than `max_value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min_value: i64,
    pub max_value: i64,
}

impl Range {
    pub fn new(min_value: i64, max_value: i64) -> Self {
        Self { min_value, max_value }
    }
}

/// The view-model used across contract tests
///
/// Rules:
/// - `username` has at least 1 character
/// - `email` contains an `@`
/// - `age` is at least 30 (defaults to 30)
/// - every range has `min_value < max_value`, reported on the range itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(default = "default_age")]
    pub age: u32,
    #[serde(default)]
    pub run_numbers: Vec<i64>,
    #[serde(default)]
    pub ranges: Vec<Range>,
}

fn default_age() -> u32 {
    30
}

pub const USERNAME_TOO_SHORT: &str = "String should have at least 1 character";
pub const AGE_TOO_LOW: &str = "Input should be greater than or equal to 30";
pub const RANGE_UNORDERED: &str = "min should be lower than max";

impl ViewModel for User {
    fn violations(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.username.is_empty() {
            errors.push(FieldError::at(["username"], USERNAME_TOO_SHORT));
        }
        if !self.email.contains('@') {
            errors.push(FieldError::at(["email"], "value is not a valid email address"));
        }
        if self.age < 30 {
            errors.push(FieldError::at(["age"], AGE_TOO_LOW));
        }
        for (index, range) in self.ranges.iter().enumerate() {
            if range.min_value >= range.max_value {
                errors.push(FieldError::new(
                    AttributePath::root().child("ranges").child(index),
                    RANGE_UNORDERED,
                ));
            }
        }
        errors
    }

    fn describe(field: &AttributePath) -> Option<FieldInfo> {
        match field.to_string().as_str() {
            "username" => Some(
                FieldInfo::new()
                    .with_title("User Name")
                    .with_description("Name shown next to the avatar")
                    .with_example("test_name"),
            ),
            "age" => Some(FieldInfo::new().with_title("Age").with_description("Age in years")),
            "ranges.min_value" => Some(FieldInfo::new().with_title("Minimum")),
            _ => None,
        }
    }
}

/// A valid user with two ordered ranges
pub fn user() -> User {
    User {
        username: "test_name".into(),
        email: "test@example.com".into(),
        age: 30,
        run_numbers: vec![1, 2, 3],
        ranges: vec![Range::new(0, 10), Range::new(20, 30)],
    }
}

/// A record model holding [`user()`]
pub fn user_model() -> SharedModel {
    SharedModel::typed(&user()).expect("fixture user is valid")
}

/// Store, registry and binding factory for one test
pub struct Fixture {
    pub store: MemoryStore,
    pub registry: Arc<BindingRegistry>,
    pub binding: Binding,
}

impl Fixture {
    /// Fixture with the default configuration
    pub fn new() -> Self {
        Self::with_config(BindingConfig::default())
    }

    /// Fixture with an explicit configuration
    pub fn with_config(config: BindingConfig) -> Self {
        let store = MemoryStore::new();
        let registry = Arc::new(BindingRegistry::new());
        let binding = Binding::with_config(Arc::new(store.clone()), registry.clone(), config)
            .expect("fixture config is valid");
        Self {
            store,
            registry,
            binding,
        }
    }
}

/// Records every post-update result
#[derive(Clone, Default)]
pub struct Recorder {
    results: Arc<Mutex<Vec<UpdateResult>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A post-update callback feeding this recorder
    pub fn callback(&self) -> UpdateCallback {
        let results = Arc::clone(&self.results);
        callback(move |result| results.lock().push(result.clone()))
    }

    /// Every recorded result, in order
    pub fn results(&self) -> Vec<UpdateResult> {
        self.results.lock().clone()
    }

    /// The most recent result
    pub fn last(&self) -> Option<UpdateResult> {
        self.results.lock().last().cloned()
    }

    /// Number of recorded results
    pub fn count(&self) -> usize {
        self.results.lock().len()
    }
}

/// Collects values pushed to a view callback
#[derive(Clone, Default)]
pub struct ViewLog {
    values: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl ViewLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one pushed value
    pub fn push(&self, value: &serde_json::Value) {
        self.values.lock().push(value.clone());
    }

    /// Every pushed value, in order
    pub fn values(&self) -> Vec<serde_json::Value> {
        self.values.lock().clone()
    }
}

/// Build a set of path strings
pub fn paths(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
