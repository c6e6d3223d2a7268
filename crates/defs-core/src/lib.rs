//! Core types for defs: the backend contract, the tree model, the listing
//! cache, the directory index and the ordered operation queue.

mod cache;
mod error;
mod index;
mod matcher;
mod model;
pub mod path;
mod queue;
mod traits;

pub use cache::{CacheConfig, CacheStats, ListingCache, SharedCache};
pub use error::{BackendError, VfsError};
pub use index::DirectoryIndex;
pub use matcher::{rank_by_name, FuzzyNameMatcher, NameMatcher};
pub use model::{DirectoryNode, EntryKind, FileEntry, FileOrDir};
pub use queue::{
    CompletionHook, EventBus, EventSubscription, OperationEvent, OperationKind, OperationOutcome,
    OperationQueue, OperationResult, OperationStatus,
};
pub use traits::{sort_dirs_first, Backend, Entry, Role, Signer};
