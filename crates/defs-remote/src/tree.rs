use std::sync::Arc;

use tracing::{debug, instrument};

use defs_core::{
    path, sort_dirs_first, Backend, BackendError, CacheConfig, CacheStats, DirectoryIndex,
    DirectoryNode, Entry, FileEntry, FileOrDir, ListingCache,
};

/// The mirrored tree of one address: backend, listing cache and directory index.
pub struct DirectoryTree {
    backend: Arc<dyn Backend>,
    address: String,
    cache: ListingCache,
    index: DirectoryIndex,
}

impl DirectoryTree {
    pub fn new(backend: Arc<dyn Backend>, address: &str, cache: CacheConfig) -> Self {
        let root = DirectoryNode::root(address);
        DirectoryTree {
            backend,
            address: root.name().to_string(),
            cache: ListingCache::new(cache),
            index: DirectoryIndex::new(root),
        }
    }

    /// Sanitized target address; the root's name.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn root(&self) -> &Arc<DirectoryNode> {
        self.index.root()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn index(&self) -> &DirectoryIndex {
        &self.index
    }

    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Absolute backend path of a DePath.
    pub fn absolute(&self, depath: &str) -> String {
        path::to_absolute(&self.address, depath)
    }

    /// Listing of an absolute path, directories first.
    ///
    /// A cache hit is returned unless `force` is set; otherwise exactly one
    /// backend list call is made and its raw result is cached.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn load(&self, absolute: &str, force: bool) -> Result<Vec<Entry>, BackendError> {
        if !force {
            if let Some(entries) = self.cache.get(absolute).await {
                return Ok(entries);
            }
        }

        let epoch = self.cache.epoch();
        let entries = self.backend.list_directory(absolute).await?;
        self.cache.insert(absolute, entries.clone(), epoch).await;

        let mut entries = entries;
        sort_dirs_first(&mut entries);
        debug!(path = %absolute, count = entries.len(), force, "loaded listing");
        Ok(entries)
    }

    /// Children of `dir` as tree values. Every directory seen is (re)registered in the index.
    pub async fn children(
        &self,
        dir: &DirectoryNode,
        force: bool,
    ) -> Result<Vec<FileOrDir>, BackendError> {
        let entries = self.load(&self.absolute(dir.path()), force).await?;
        Ok(entries
            .iter()
            .map(|entry| self.materialize(dir, entry))
            .collect())
    }

    fn materialize(&self, parent: &DirectoryNode, entry: &Entry) -> FileOrDir {
        if entry.is_dir {
            FileOrDir::Directory(
                self.index
                    .register(DirectoryNode::child(parent, &entry.name)),
            )
        } else {
            FileOrDir::File(FileEntry::from_entry(parent, entry))
        }
    }

    /// Drop the cached listing of a directory.
    pub async fn invalidate(&self, depath: &str) {
        self.cache.invalidate(&self.absolute(depath)).await;
    }

    /// Forget a deleted directory and everything below it.
    pub async fn evict_subtree(&self, depath: &str) {
        let removed = self.index.remove_subtree(depath);
        let dropped = self.cache.invalidate_prefix(&self.absolute(depath)).await;
        debug!(path = %depath, removed, dropped, "evicted subtree");
    }

    /// Drop every cached listing.
    pub async fn purge(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
