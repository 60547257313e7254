//! Regproxy Registry Storage Layer
//!
//! This crate provides the storage abstraction for the upstream registry,
//! supporting an in-memory backend and a line-oriented file backend.

pub mod backend;
pub mod codec;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::{RegistryStore, Snapshot};
pub use codec::{parse_snapshot, render_snapshot};
pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;
