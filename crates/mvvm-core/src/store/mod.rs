// # Reactive Store Implementations
//
// This module provides implementations of the ReactiveStore trait.

pub mod memory;

pub use memory::MemoryStore;
