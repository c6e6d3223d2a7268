//! Storage backends and the directory manager for defs.
//!
//! [`DirectoryManager`] mirrors the tree of one address on an append-only
//! [`defs_core::Backend`]: listings are cached per directory, discovered
//! directories are indexed by path, and every mutation is run through a
//! single ordered queue whose events are delivered to every subscriber.

pub mod access;
pub mod backends;
mod manager;
pub mod search;
mod tree;
pub mod walk;

pub use backends::{FsBackend, MemoryBackend};
pub use manager::{DirectoryManager, ManagerOptions};
pub use tree::DirectoryTree;
pub use walk::{StopHandle, WalkItem, WalkOptions, Walker};
