//! Core traits for the binding engine
//!
//! This module defines the abstract interfaces the engine talks to.
//!
//! - [`ReactiveStore`]: keyed view-side state with change hooks and batching

pub mod reactive_store;

pub use reactive_store::{ChangeHandler, ReactiveStore, StoreBatch, SubscriptionId};
