use std::future::Future;
use std::ops::ControlFlow;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info, instrument, warn};

use defs_config::{DefsConfig, DEFAULT_BUS_CAPACITY, DEFAULT_QUEUE_CAPACITY};
use defs_core::{
    path, Backend, BackendError, CacheConfig, CacheStats, CompletionHook, DirectoryNode, Entry,
    EventSubscription, FileEntry, FileOrDir, FuzzyNameMatcher, OperationEvent, OperationKind,
    OperationOutcome, OperationQueue, OperationResult, Role, Signer, VfsError,
};

use crate::access;
use crate::backends;
use crate::search;
use crate::tree::DirectoryTree;
use crate::walk::{self, WalkItem, WalkOptions, Walker};

/// Construction settings for a [`DirectoryManager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub cache: CacheConfig,
    pub queue_capacity: usize,
    /// Unread events at which a subscriber is reported as lagging.
    pub bus_capacity: usize,
    /// Content key handed to every mutating backend call.
    pub key: Option<String>,
    pub ignore_case: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            cache: CacheConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            bus_capacity: DEFAULT_BUS_CAPACITY,
            key: None,
            ignore_case: true,
        }
    }
}

impl From<&DefsConfig> for ManagerOptions {
    fn from(config: &DefsConfig) -> Self {
        ManagerOptions {
            cache: CacheConfig::from(&config.cache),
            queue_capacity: config.queue_capacity(),
            bus_capacity: config.bus_capacity(),
            key: config.account.as_ref().and_then(|a| a.key.clone()),
            ignore_case: config.search.ignore_case,
        }
    }
}

/// Keeps the listing cache in step with settled operations.
///
/// Runs on the queue worker before the event is published, so anyone who has
/// seen an event never reads the destination's pre-operation listing.
struct CacheRefresher {
    tree: Arc<DirectoryTree>,
}

#[async_trait]
impl CompletionHook for CacheRefresher {
    async fn on_complete(&self, event: &OperationEvent) {
        if event.is_success() && event.kind == OperationKind::DeleteDirectory {
            if let OperationOutcome::Deleted { path } = &event.result.outcome {
                self.tree.evict_subtree(path).await;
            }
        }

        match &event.result.destination {
            Some(destination) => {
                self.tree.invalidate(destination).await;
                let tree = Arc::clone(&self.tree);
                let absolute = tree.absolute(destination);
                tokio::spawn(async move {
                    if let Err(e) = tree.load(&absolute, true).await {
                        warn!(path = %absolute, error = %e, "listing refill failed");
                    }
                });
            }
            None => {
                self.tree.purge().await;
                walk::spawn_warm(Arc::clone(&self.tree));
            }
        }
    }
}

/// Directory-tree view over one address of an append-only backend.
///
/// Reads go through the listing cache and the traversal engine. Mutations
/// are authorized up front, then serialized through the operation queue;
/// each resolves with its [`OperationEvent`], which every bus subscriber
/// also observes.
pub struct DirectoryManager {
    tree: Arc<DirectoryTree>,
    queue: OperationQueue,
    signer: RwLock<Option<Signer>>,
    key: Option<String>,
    matcher: FuzzyNameMatcher,
}

impl DirectoryManager {
    /// Create a manager and spawn its queue worker on the current runtime.
    pub fn new(
        backend: Arc<dyn Backend>,
        address: &str,
        signer: Option<Signer>,
        options: ManagerOptions,
    ) -> Self {
        let tree = Arc::new(DirectoryTree::new(backend, address, options.cache));
        let hook: Arc<dyn CompletionHook> = Arc::new(CacheRefresher {
            tree: Arc::clone(&tree),
        });
        let queue = OperationQueue::spawn(options.queue_capacity, options.bus_capacity, Some(hook));
        info!(address = %tree.address(), signer = ?signer.as_ref().map(Signer::address), "directory manager ready");

        DirectoryManager {
            tree,
            queue,
            signer: RwLock::new(signer),
            key: options.key,
            matcher: FuzzyNameMatcher::new(options.ignore_case),
        }
    }

    /// Create a manager from configuration over an existing backend.
    pub async fn from_config(config: &DefsConfig, backend: Arc<dyn Backend>) -> Result<Self, VfsError> {
        config.validate_or_err()?;
        let config = config.effective();
        let signer = config
            .account
            .as_ref()
            .and_then(|account| account.address.as_deref())
            .map(Signer::new);

        let manager = Self::new(
            backend,
            &config.target.address,
            signer,
            ManagerOptions::from(&config),
        );
        if config.preload {
            manager.preload().await?;
        }
        Ok(manager)
    }

    /// Create a manager and the backend its configuration names.
    pub async fn open(config: &DefsConfig) -> Result<Self, VfsError> {
        let backend = backends::from_config(&config.backend)?;
        Self::from_config(config, backend).await
    }

    // --- navigation ---

    pub fn root_directory(&self) -> Arc<DirectoryNode> {
        Arc::clone(self.tree.root())
    }

    /// Sanitized target address.
    pub fn address(&self) -> &str {
        self.tree.address()
    }

    pub fn tree(&self) -> &Arc<DirectoryTree> {
        &self.tree
    }

    /// Raw listing of an absolute backend path, directories first.
    pub async fn load(&self, absolute: &str, force: bool) -> Result<Vec<Entry>, VfsError> {
        Ok(self.tree.load(absolute, force).await?)
    }

    /// Children of a directory as tree values.
    pub async fn load_directory(
        &self,
        dir: &DirectoryNode,
        force: bool,
    ) -> Result<Vec<FileOrDir>, VfsError> {
        Ok(self.tree.children(dir, force).await?)
    }

    pub async fn resolve_path(&self, depath: &str) -> Result<Option<FileOrDir>, VfsError> {
        search::resolve_path(&self.tree, depath).await
    }

    pub fn walker(&self, start: Arc<DirectoryNode>, options: WalkOptions) -> Walker {
        Walker::new(Arc::clone(&self.tree), start, options)
    }

    pub async fn walk<F>(
        &self,
        start: Arc<DirectoryNode>,
        options: WalkOptions,
        visitor: F,
    ) -> Result<(), VfsError>
    where
        F: FnMut(WalkItem) -> ControlFlow<()>,
    {
        walk::walk(Arc::clone(&self.tree), start, options, visitor).await
    }

    /// Purge the cache and list every directory from the root.
    pub async fn preload(&self) -> Result<usize, VfsError> {
        walk::preload(Arc::clone(&self.tree)).await
    }

    pub async fn search(
        &self,
        dir: Arc<DirectoryNode>,
        query: &str,
    ) -> Result<Vec<FileOrDir>, VfsError> {
        search::search(&self.tree, &self.matcher, dir, query).await
    }

    // --- mutations ---

    #[instrument(skip(self, parent), fields(parent = %parent.path()))]
    pub async fn create_directory(
        &self,
        parent: &DirectoryNode,
        name: &str,
    ) -> Result<OperationEvent, VfsError> {
        let signer = self.owner_signer()?;
        if !path::is_valid_name(name) {
            return Err(VfsError::Unknown(format!("invalid directory name: {:?}", name)));
        }

        let depath = path::join(parent.path(), name);
        let absolute = self.tree.absolute(&depath);
        let backend = Arc::clone(self.tree.backend());
        let key = self.key.clone();
        self.submit(
            OperationKind::CreateDirectory,
            Some(parent.path().to_string()),
            async move {
                backend
                    .create_directory(&signer, &absolute, key.as_deref())
                    .await
            },
            move |_| OperationOutcome::Created { path: depath },
        )
        .await
    }

    #[instrument(skip(self, dir, content), fields(dir = %dir.path(), size = content.len()))]
    pub async fn upload_file(
        &self,
        dir: &DirectoryNode,
        name: &str,
        content: Vec<u8>,
    ) -> Result<OperationEvent, VfsError> {
        let signer = self.owner_signer()?;
        if !path::is_valid_name(name) {
            return Err(VfsError::Unknown(format!("malformed file name: {:?}", name)));
        }

        let depath = path::join(dir.path(), name);
        let absolute = self.tree.absolute(&depath);
        let backend = Arc::clone(self.tree.backend());
        let key = self.key.clone();
        self.submit(
            OperationKind::UploadFile,
            Some(dir.path().to_string()),
            async move {
                backend
                    .upload_file(&signer, &absolute, &content, key.as_deref())
                    .await
            },
            move |_| OperationOutcome::Uploaded { path: depath },
        )
        .await
    }

    #[instrument(skip(self, file), fields(path = %file.path()))]
    pub async fn delete_file(&self, file: &FileEntry) -> Result<OperationEvent, VfsError> {
        let signer = self.owner_signer()?;
        self.submit_delete_file(file, signer).await
    }

    /// Delete a directory and everything below it.
    ///
    /// Children are deleted one at a time, each subdirectory after its own
    /// contents, and the directory itself is queued last. The first failure
    /// stops the sequence; what was already deleted stays deleted.
    #[instrument(skip(self, dir), fields(path = %dir.path()))]
    pub async fn delete_directory(
        &self,
        dir: &Arc<DirectoryNode>,
    ) -> Result<OperationEvent, VfsError> {
        if dir.is_root() {
            return Err(VfsError::Unknown(
                "the root directory cannot be deleted".to_string(),
            ));
        }
        let signer = self.owner_signer()?;
        self.delete_tree(Arc::clone(dir), signer).await
    }

    fn delete_tree(
        &self,
        dir: Arc<DirectoryNode>,
        signer: Signer,
    ) -> BoxFuture<'_, Result<OperationEvent, VfsError>> {
        Box::pin(async move {
            // Fresh listing: children created since the last load must go too
            let mut walker = self.walker(Arc::clone(&dir), WalkOptions::default().max_depth(0).forced());
            while let Some(item) = walker.next().await? {
                match item {
                    WalkItem::Entry(FileOrDir::Directory(child)) => {
                        self.delete_tree(child, signer.clone()).await?;
                    }
                    WalkItem::Entry(FileOrDir::File(file)) => {
                        self.submit_delete_file(&file, signer.clone()).await?;
                    }
                    WalkItem::Batch { .. } => {}
                }
            }
            self.submit_delete_directory(&dir, signer).await
        })
    }

    async fn submit_delete_file(
        &self,
        file: &FileEntry,
        signer: Signer,
    ) -> Result<OperationEvent, VfsError> {
        let depath = file.path().to_string();
        let absolute = self.tree.absolute(&depath);
        let backend = Arc::clone(self.tree.backend());
        let key = self.key.clone();
        self.submit(
            OperationKind::DeleteFile,
            Some(file.parent_path().to_string()),
            async move { backend.delete_file(&signer, &absolute, key.as_deref()).await },
            move |_| OperationOutcome::Deleted { path: depath },
        )
        .await
    }

    async fn submit_delete_directory(
        &self,
        dir: &DirectoryNode,
        signer: Signer,
    ) -> Result<OperationEvent, VfsError> {
        let depath = dir.path().to_string();
        let absolute = self.tree.absolute(&depath);
        let backend = Arc::clone(self.tree.backend());
        let key = self.key.clone();
        self.submit(
            OperationKind::DeleteDirectory,
            Some(dir.parent_path().unwrap_or_default().to_string()),
            async move {
                backend
                    .delete_directory(&signer, &absolute, key.as_deref())
                    .await
            },
            move |_| OperationOutcome::Deleted { path: depath },
        )
        .await
    }

    /// Reserve storage for the target address. Requires the allocator role.
    #[instrument(skip(self))]
    pub async fn reserve_space(&self, amount: u64) -> Result<OperationEvent, VfsError> {
        let signer = access::require_signer(self.signer())?;
        access::require_role(self.tree.backend().as_ref(), &signer, Role::Allocator).await?;

        let address = self.tree.address().to_string();
        let backend = Arc::clone(self.tree.backend());
        self.submit(
            OperationKind::ReserveSpace,
            None,
            async move { backend.reserve_space(&signer, &address, amount).await },
            move |_| OperationOutcome::SpaceReserved { amount },
        )
        .await
    }

    /// Grant the allocator role to `address`. Requires the admin role.
    #[instrument(skip(self))]
    pub async fn grant_allocator_role(&self, address: &str) -> Result<OperationEvent, VfsError> {
        let signer = access::require_signer(self.signer())?;
        access::require_role(self.tree.backend().as_ref(), &signer, Role::Admin).await?;

        let grantee = defs_config::sanitize_address(address);
        let target = grantee.clone();
        let backend = Arc::clone(self.tree.backend());
        self.submit(
            OperationKind::GrantRole,
            None,
            async move { backend.grant_allocator_role(&signer, &target).await },
            move |_| OperationOutcome::RoleGranted { address: grantee },
        )
        .await
    }

    async fn submit<T, Fut, S>(
        &self,
        kind: OperationKind,
        destination: Option<String>,
        work: Fut,
        outcome: S,
    ) -> Result<OperationEvent, VfsError>
    where
        Fut: Future<Output = Result<T, BackendError>> + Send + 'static,
        S: FnOnce(T) -> OperationOutcome + Send + 'static,
        T: Send + 'static,
    {
        let failed_destination = destination.clone();
        self.queue
            .submit(
                kind,
                work,
                move |value| OperationResult::new(destination, outcome(value)),
                move |err| OperationResult::failed(failed_destination, err),
            )
            .await
    }

    // --- reads outside the queue ---

    pub async fn download_file(&self, file: &FileEntry) -> Result<Vec<u8>, VfsError> {
        let absolute = self.tree.absolute(file.path());
        Ok(self.tree.backend().download_to_buffer(&absolute).await?)
    }

    pub async fn occupied_space(&self) -> Result<u64, VfsError> {
        Ok(self.tree.backend().get_occupied_space(self.address()).await?)
    }

    pub async fn reserved_space(&self) -> Result<u64, VfsError> {
        Ok(self.tree.backend().get_reserved_space(self.address()).await?)
    }

    /// Reserved minus occupied, floored at zero.
    pub async fn available_space(&self) -> Result<u64, VfsError> {
        let reserved = self.reserved_space().await?;
        let occupied = self.occupied_space().await?;
        Ok(reserved.saturating_sub(occupied))
    }

    // --- observers and account ---

    pub fn subscribe(&self) -> EventSubscription {
        self.queue.subscribe()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.tree.cache_stats().await
    }

    pub fn signer(&self) -> Option<Signer> {
        self.signer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Connect or disconnect the signing account.
    pub fn set_signer(&self, signer: Option<Signer>) {
        debug!(signer = ?signer.as_ref().map(Signer::address), "signer changed");
        *self.signer.write().unwrap_or_else(|e| e.into_inner()) = signer;
    }

    fn owner_signer(&self) -> Result<Signer, VfsError> {
        let signer = access::require_signer(self.signer())?;
        access::require_owner(&signer, self.tree.address())?;
        Ok(signer)
    }
}
