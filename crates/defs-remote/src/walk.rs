//! Depth-first traversal over the mirrored tree.
//!
//! [`Walker`] is an explicit-stack iterator: each directory visited costs one
//! listing through the cache. A subdirectory's descendants are produced before
//! the subdirectory entry itself; in batch mode a directory's entries are
//! delivered together once its subdirectories are done.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use defs_core::{DirectoryNode, FileOrDir, VfsError};

use crate::tree::DirectoryTree;

/// Traversal settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Deepest level whose subdirectories are still entered. `Some(0)` lists
    /// only the start directory; None is unbounded.
    pub max_depth: Option<usize>,
    /// Deliver one [`WalkItem::Batch`] per directory instead of single entries.
    pub batch: bool,
    /// Bypass the listing cache for every directory visited.
    pub force: bool,
}

impl WalkOptions {
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn batched(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// One step of a traversal.
#[derive(Debug, Clone)]
pub enum WalkItem {
    Entry(FileOrDir),
    Batch {
        dir: Arc<DirectoryNode>,
        entries: Vec<FileOrDir>,
    },
}

/// Cooperative cancellation for a running walk.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Frame {
    dir: Arc<DirectoryNode>,
    depth: usize,
    entries: VecDeque<FileOrDir>,
    batch: Vec<FileOrDir>,
    /// Subdirectory entry held back until its subtree is done.
    pending: Option<FileOrDir>,
}

enum Step {
    Yield(WalkItem),
    Descend(Arc<DirectoryNode>, usize),
    Continue,
    Done,
}

pub struct Walker {
    tree: Arc<DirectoryTree>,
    options: WalkOptions,
    start: Option<Arc<DirectoryNode>>,
    stack: Vec<Frame>,
    stop: StopHandle,
    listed: usize,
}

impl Walker {
    pub fn new(tree: Arc<DirectoryTree>, start: Arc<DirectoryNode>, options: WalkOptions) -> Self {
        Walker {
            tree,
            options,
            start: Some(start),
            stack: Vec::new(),
            stop: StopHandle::default(),
            listed: 0,
        }
    }

    /// Stop the walk. Listings already in flight complete; nothing further is fetched.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Number of directories listed so far.
    pub fn directories_listed(&self) -> usize {
        self.listed
    }

    /// Advance the walk. Returns None when finished or stopped.
    pub async fn next(&mut self) -> Result<Option<WalkItem>, VfsError> {
        loop {
            if self.stop.is_stopped() {
                self.stack.clear();
                self.start = None;
                return Ok(None);
            }

            if let Some(start) = self.start.take() {
                self.enter(start, 0).await?;
                continue;
            }

            match self.step() {
                Step::Yield(item) => return Ok(Some(item)),
                Step::Descend(dir, depth) => {
                    if self.stop.is_stopped() {
                        continue;
                    }
                    self.enter(dir, depth).await?;
                }
                Step::Continue => continue,
                Step::Done => return Ok(None),
            }
        }
    }

    fn step(&mut self) -> Step {
        let batch = self.options.batch;
        let max_depth = self.options.max_depth;

        let Some(frame) = self.stack.last_mut() else {
            return Step::Done;
        };

        if let Some(item) = frame.pending.take() {
            if batch {
                frame.batch.push(item);
                return Step::Continue;
            }
            return Step::Yield(WalkItem::Entry(item));
        }

        match frame.entries.pop_front() {
            Some(entry) => {
                let within = max_depth.map_or(true, |max| frame.depth < max);
                let descend = if within {
                    entry.as_directory().cloned()
                } else {
                    None
                };
                if let Some(dir) = descend {
                    let depth = frame.depth + 1;
                    frame.pending = Some(entry);
                    return Step::Descend(dir, depth);
                }
                if batch {
                    frame.batch.push(entry);
                    return Step::Continue;
                }
                Step::Yield(WalkItem::Entry(entry))
            }
            None => match self.stack.pop() {
                Some(frame) if batch => Step::Yield(WalkItem::Batch {
                    dir: frame.dir,
                    entries: frame.batch,
                }),
                _ => Step::Continue,
            },
        }
    }

    async fn enter(&mut self, dir: Arc<DirectoryNode>, depth: usize) -> Result<(), VfsError> {
        let entries = self.tree.children(&dir, self.options.force).await?;
        self.listed += 1;
        trace!(path = %dir.path(), depth, count = entries.len(), "entered directory");
        self.stack.push(Frame {
            dir,
            depth,
            entries: entries.into(),
            batch: Vec::new(),
            pending: None,
        });
        Ok(())
    }
}

/// Walk from `start`, handing each item to `visitor` until it breaks.
pub async fn walk<F>(
    tree: Arc<DirectoryTree>,
    start: Arc<DirectoryNode>,
    options: WalkOptions,
    mut visitor: F,
) -> Result<(), VfsError>
where
    F: FnMut(WalkItem) -> ControlFlow<()>,
{
    let mut walker = Walker::new(tree, start, options);
    while let Some(item) = walker.next().await? {
        if visitor(item).is_break() {
            walker.stop();
        }
    }
    Ok(())
}

/// Pull every directory listing into the cache. Returns the number of directories listed.
pub async fn warm(tree: Arc<DirectoryTree>) -> Result<usize, VfsError> {
    let root = Arc::clone(tree.root());
    let mut walker = Walker::new(tree, root, WalkOptions::default());
    while walker.next().await?.is_some() {}
    Ok(walker.directories_listed())
}

/// Purge the cache and warm it again from the root.
pub async fn preload(tree: Arc<DirectoryTree>) -> Result<usize, VfsError> {
    tree.purge().await;
    let listed = warm(Arc::clone(&tree)).await?;
    info!(address = %tree.address(), directories = listed, "preload complete");
    Ok(listed)
}

/// Fire-and-forget [`warm`]. Failures are logged only.
pub fn spawn_warm(tree: Arc<DirectoryTree>) {
    tokio::spawn(async move {
        match warm(tree).await {
            Ok(listed) => debug!(directories = listed, "background preload complete"),
            Err(e) => warn!(error = %e, "background preload failed"),
        }
    });
}
