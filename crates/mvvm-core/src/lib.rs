// # mvvm-core
//
// Binding engine that keeps a view-model and a reactive view in sync.
//
// ## Architecture Overview
//
// - **path**: parsed attribute paths (`a.b[0].c`) with get/set into values
// - **schema** / **validator**: validation-gated writes with rollback
// - **diff**: structural comparison reporting changed paths
// - **model**: the linked object (record, mapping, callable, object)
// - **Communicator**: owns a linked object and connects it to the view
// - **connection**: direct-callback and store-backed strategies
// - **ReactiveStore**: trait for the view-side keyed state
// - **BindingRegistry**: communicators by id and by binding key
//
// ## Design Principles
//
// 1. **Validation never throws**: rejections land in `UpdateResult::errored`
// 2. **No partial writes**: candidates are staged on a copy first
// 3. **Explicit lifecycle**: registry entries are removed by callers only
// 4. **Reentrant hooks**: no lock is held while sinks and callbacks run

pub mod communicator;
pub mod config;
pub mod connection;
pub mod diff;
pub mod error;
pub mod model;
pub mod path;
pub mod registry;
pub mod schema;
pub mod store;
pub mod traits;
pub mod update;
pub mod validator;

// Re-export core types for convenience
pub use communicator::{Binding, Communicator};
pub use config::BindingConfig;
pub use connection::{ConnectTarget, ViewHook};
pub use diff::{ChangeKind, ChangedPath};
pub use error::{Error, Result};
pub use model::{LinkedObject, LinkedShape, RecordModel, SharedModel};
pub use path::{AttributePath, PathSegment};
pub use registry::BindingRegistry;
pub use schema::{FieldError, FieldInfo, Schema, TypedSchema, ValidationErrors, ViewModel};
pub use store::MemoryStore;
pub use traits::{ReactiveStore, StoreBatch};
pub use update::{UpdateCallback, UpdateObserver, UpdateResult};
