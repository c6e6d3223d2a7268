use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::model::DirectoryNode;
use crate::path;

/// Path-keyed registry of discovered directories.
///
/// Registration is last-write-wins: re-discovering a path replaces the node
/// stored for it. The root is held apart and can never be replaced or removed.
pub struct DirectoryIndex {
    root: Arc<DirectoryNode>,
    nodes: RwLock<HashMap<String, Arc<DirectoryNode>>>,
}

impl DirectoryIndex {
    pub fn new(root: DirectoryNode) -> Self {
        DirectoryIndex {
            root: Arc::new(root),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Arc<DirectoryNode> {
        &self.root
    }

    /// Register a directory, replacing any node previously stored at its path.
    pub fn register(&self, node: DirectoryNode) -> Arc<DirectoryNode> {
        if node.path().is_empty() {
            return Arc::clone(&self.root);
        }
        let node = Arc::new(node);
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        if nodes
            .insert(node.path().to_string(), Arc::clone(&node))
            .is_some()
        {
            trace!(path = %node.path(), "replaced indexed directory");
        }
        node
    }

    /// Look up a directory by DePath.
    pub fn get(&self, path: &str) -> Option<Arc<DirectoryNode>> {
        if path.is_empty() {
            return Some(Arc::clone(&self.root));
        }
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes.get(path).cloned()
    }

    /// Parent of a directory, resolved through the index.
    pub fn parent_of(&self, node: &DirectoryNode) -> Option<Arc<DirectoryNode>> {
        node.parent_path().and_then(|parent| self.get(parent))
    }

    /// Drop a directory and everything indexed below it. Returns how many nodes were removed.
    pub fn remove_subtree(&self, root_path: &str) -> usize {
        if root_path.is_empty() {
            return 0;
        }
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        let before = nodes.len();
        nodes.retain(|p, _| !path::is_within(p, root_path));
        before - nodes.len()
    }

    /// Number of indexed directories, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every discovered directory. The root stays.
    pub fn clear(&self) {
        self.nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> DirectoryIndex {
        DirectoryIndex::new(DirectoryNode::root("0xabc"))
    }

    #[test]
    fn test_root_lookup() {
        let index = index();
        let root = index.get("").unwrap();
        assert!(root.is_root());
        assert!(index.is_empty());
    }

    #[test]
    fn test_register_and_get() {
        let index = index();
        let docs = index.register(DirectoryNode::child(index.root(), "docs"));

        let found = index.get("docs").unwrap();
        assert!(Arc::ptr_eq(&docs, &found));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_register_last_write_wins() {
        let index = index();
        let first = index.register(DirectoryNode::child(index.root(), "docs"));
        let second = index.register(DirectoryNode::child(index.root(), "docs"));

        let found = index.get("docs").unwrap();
        assert!(Arc::ptr_eq(&second, &found));
        assert!(!Arc::ptr_eq(&first, &found));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_root_never_replaced() {
        let index = index();
        let original = Arc::clone(index.root());
        let returned = index.register(DirectoryNode::root("0xother"));

        assert!(Arc::ptr_eq(&original, &returned));
        assert_eq!(index.get("").unwrap().name(), "0xabc");
    }

    #[test]
    fn test_parent_of() {
        let index = index();
        let docs = index.register(DirectoryNode::child(index.root(), "docs"));
        let drafts = index.register(DirectoryNode::child(&docs, "drafts"));

        assert_eq!(index.parent_of(&drafts).unwrap().path(), "docs");
        assert!(index.parent_of(&docs).unwrap().is_root());
        assert!(index.parent_of(index.root()).is_none());
    }

    #[test]
    fn test_remove_subtree() {
        let index = index();
        let docs = index.register(DirectoryNode::child(index.root(), "docs"));
        index.register(DirectoryNode::child(&docs, "drafts"));
        index.register(DirectoryNode::child(index.root(), "docsx"));

        assert_eq!(index.remove_subtree("docs"), 2);
        assert!(index.get("docs").is_none());
        assert!(index.get("docs/drafts").is_none());
        assert!(index.get("docsx").is_some());
        assert_eq!(index.remove_subtree(""), 0);
    }

    #[test]
    fn test_clear_keeps_root() {
        let index = index();
        index.register(DirectoryNode::child(index.root(), "docs"));
        index.clear();
        assert!(index.is_empty());
        assert!(index.get("").is_some());
    }
}
