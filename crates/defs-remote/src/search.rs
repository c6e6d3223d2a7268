use std::sync::Arc;

use tracing::{debug, instrument};

use defs_core::{path, rank_by_name, DirectoryNode, FileOrDir, NameMatcher, VfsError};

use crate::tree::DirectoryTree;
use crate::walk::{WalkItem, WalkOptions, Walker};

/// Fuzzy-match `query` against every name below `start`.
///
/// Matches are ranked within each directory, then concatenated in traversal
/// order. An empty query returns nothing without touching the backend.
#[instrument(skip(tree, matcher, start), fields(from = %start.path()))]
pub async fn search(
    tree: &Arc<DirectoryTree>,
    matcher: &dyn NameMatcher,
    start: Arc<DirectoryNode>,
    query: &str,
) -> Result<Vec<FileOrDir>, VfsError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let mut walker = Walker::new(Arc::clone(tree), start, WalkOptions::default().batched());
    let mut found = Vec::new();
    while let Some(item) = walker.next().await? {
        if let WalkItem::Batch { entries, .. } = item {
            found.extend(rank_by_name(matcher, query, entries, |e| e.name()));
        }
    }

    debug!(matches = found.len(), directories = walker.directories_listed(), "search complete");
    Ok(found)
}

/// Find the tree value at a DePath.
///
/// The root and already indexed directories resolve without I/O. Anything
/// else is searched for from the root, no deeper than the path's own parent,
/// stopping at the first exact match.
#[instrument(skip(tree))]
pub async fn resolve_path(
    tree: &Arc<DirectoryTree>,
    depath: &str,
) -> Result<Option<FileOrDir>, VfsError> {
    let target = path::normalize(depath);
    if target.is_empty() {
        return Ok(Some(FileOrDir::Directory(Arc::clone(tree.root()))));
    }
    if let Some(dir) = tree.index().get(&target) {
        return Ok(Some(FileOrDir::Directory(dir)));
    }

    let max_depth = path::depth(&target) - 1;
    let mut walker = Walker::new(
        Arc::clone(tree),
        Arc::clone(tree.root()),
        WalkOptions::default().max_depth(max_depth),
    );
    while let Some(item) = walker.next().await? {
        if let WalkItem::Entry(entry) = item {
            if entry.path() == target {
                walker.stop();
                return Ok(Some(entry));
            }
        }
    }
    debug!(path = %target, "path not found");
    Ok(None)
}
