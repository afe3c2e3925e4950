//! Persistent key-value storage for offsync.
//!
//! This module provides a trait-based interface over durable string storage
//! (in-memory for tests, one-file-per-key on disk) and a registry that
//! resolves a backend by name at runtime.
//!
//! # Design Principles
//! - Values are opaque strings; callers own their encoding
//! - Async operations: every backend call may suspend
//! - Missing keys are not errors: reads return `None`, removals are no-ops

pub mod store;
pub mod registry;
pub mod memory;
pub mod file;

pub use store::{KeyValueStore, KeyValueStoreExt};
pub use registry::{StoreRegistry, StoreFactory, create_default_registry};
pub use memory::MemoryStore;
pub use file::FileStore;
