//! Update results and post-update notification
//!
//! Every synchronization pass produces a fresh [`UpdateResult`] that
//! partitions the affected paths into `updated` and `errored`. The result
//! is handed to the communicator's post-update callback, if one was given.
//!
//! Callbacks are plain synchronous closures. For asynchronous handling,
//! [`update_channel`] turns a callback into a bounded tokio channel and
//! [`spawn_update_observer`] drives an [`UpdateObserver`] from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Partition of affected paths after one update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Paths whose new value was applied
    #[serde(default)]
    pub updated: BTreeSet<String>,

    /// Paths whose new value was rejected; the model is unchanged there
    #[serde(default)]
    pub errored: BTreeSet<String>,

    /// Validation message per errored path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, String>,
}

impl UpdateResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Result with a single updated path
    pub fn updated(path: impl Into<String>) -> Self {
        let mut result = Self::new();
        result.mark_updated(path);
        result
    }

    /// Result with a single errored path
    pub fn errored(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new();
        result.mark_errored(path, message);
        result
    }

    /// Record an applied path
    pub fn mark_updated(&mut self, path: impl Into<String>) {
        self.updated.insert(path.into());
    }

    /// Record a rejected path with its message
    pub fn mark_errored(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let path = path.into();
        self.messages.insert(path.clone(), message.into());
        self.errored.insert(path);
    }

    /// Whether nothing was affected
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.errored.is_empty()
    }

    /// Whether any path was rejected
    pub fn has_errors(&self) -> bool {
        !self.errored.is_empty()
    }

    /// Validation message for an errored path
    pub fn message(&self, path: &str) -> Option<&str> {
        self.messages.get(path).map(String::as_str)
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: UpdateResult) {
        self.updated.extend(other.updated);
        self.errored.extend(other.errored);
        self.messages.extend(other.messages);
    }
}

/// Post-update callback
pub type UpdateCallback = Arc<dyn Fn(&UpdateResult) + Send + Sync>;

/// Wrap a closure as an [`UpdateCallback`]
pub fn callback<F>(f: F) -> UpdateCallback
where
    F: Fn(&UpdateResult) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stream of update results produced by [`update_channel`]
pub type UpdateStream = ReceiverStream<UpdateResult>;

/// Create a callback that forwards results into a bounded channel
///
/// When the channel is full the result is dropped and a warning is logged;
/// the binding layer never blocks on a slow consumer.
pub fn update_channel(capacity: usize) -> (UpdateCallback, UpdateStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let forward = callback(move |result: &UpdateResult| {
        if let Err(e) = tx.try_send(result.clone()) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Update channel full, dropping update result. Consider increasing update_channel_capacity.");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    debug!("Update channel closed, dropping update result");
                }
            }
        }
    });
    (forward, ReceiverStream::new(rx))
}

/// Asynchronous post-update handler
#[async_trait]
pub trait UpdateObserver: Send + Sync {
    /// Handle one update result
    async fn on_update(&self, result: UpdateResult);
}

/// Drive `observer` with every result from `stream`
///
/// Results are handled one at a time, in arrival order. The task finishes
/// once every sender (every clone of the callback) has been dropped.
pub fn spawn_update_observer(
    mut stream: UpdateStream,
    observer: Arc<dyn UpdateObserver>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            observer.on_update(result).await;
        }
        debug!("Update stream ended, observer stopped");
    })
}
