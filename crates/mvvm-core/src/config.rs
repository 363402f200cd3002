//! Configuration types for the binding engine
//!
//! This module defines the settings shared by every communicator created
//! from one [`Binding`](crate::communicator::Binding).

use serde::{Deserialize, Serialize};

/// Binding configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Joins the binding key and the flattened tracked path in store keys
    ///
    /// With the default `_`, tracked path `username` of binding `user`
    /// lives under store key `user_username`.
    #[serde(default = "default_separator")]
    pub key_separator: String,

    /// Replaces `.` of a tracked path inside its store key
    #[serde(default = "default_separator")]
    pub path_separator_replacement: String,

    /// Capacity of channels created through [`BindingConfig::update_channel`]
    ///
    /// When full, new update results are dropped (with a warning log).
    ///
    /// Default: 1000 results
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,

    /// Ignore store notifications caused by this connection's own
    /// model-to-view pushes
    #[serde(default = "default_suppress_view_echo")]
    pub suppress_view_echo: bool,
}

impl BindingConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            key_separator: default_separator(),
            path_separator_replacement: default_separator(),
            update_channel_capacity: default_update_channel_capacity(),
            suppress_view_echo: default_suppress_view_echo(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.key_separator.is_empty() {
            return Err(crate::Error::config("key_separator cannot be empty"));
        }
        if self.path_separator_replacement.contains('.') {
            return Err(crate::Error::config(
                "path_separator_replacement cannot contain '.'",
            ));
        }
        if self.update_channel_capacity == 0 {
            return Err(crate::Error::config("update_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Store key for a tracked path
    ///
    /// `None` binding key yields the flattened path alone.
    pub fn store_key(&self, binding_key: Option<&str>, path: &crate::path::AttributePath) -> String {
        let suffix = path.store_suffix(&self.path_separator_replacement);
        match binding_key {
            Some(key) => format!("{key}{}{suffix}", self.key_separator),
            None => suffix,
        }
    }

    /// Create an update channel with the configured capacity
    pub fn update_channel(&self) -> (crate::update::UpdateCallback, crate::update::UpdateStream) {
        crate::update::update_channel(self.update_channel_capacity)
    }
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_separator() -> String {
    "_".to_string()
}

fn default_update_channel_capacity() -> usize {
    1000
}

fn default_suppress_view_echo() -> bool {
    true
}
