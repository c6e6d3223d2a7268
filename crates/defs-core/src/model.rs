use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path;
use crate::traits::Entry;

/// Discriminant of [`FileOrDir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory discovered through a listing.
///
/// The parent is held as its DePath, never as an owning edge; look it up
/// through the directory index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    name: String,
    path: String,
    parent: Option<String>,
}

impl DirectoryNode {
    /// The root directory of an address. Its name is the sanitized address.
    pub fn root(address: &str) -> Self {
        DirectoryNode {
            name: defs_config::sanitize_address(address),
            path: String::new(),
            parent: None,
        }
    }

    /// A child directory of `parent`.
    pub fn child(parent: &DirectoryNode, name: &str) -> Self {
        DirectoryNode {
            name: name.to_string(),
            path: path::join(&parent.path, name),
            parent: Some(parent.path.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// DePath of this directory; empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// DePath of the parent directory; None for the root.
    pub fn parent_path(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.path.is_empty()
    }
}

/// A file observed in a listing. A fresh value is built on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    name: String,
    path: String,
    size: u64,
    media_type: String,
    parent: String,
    modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    /// Build a file value from a raw listing entry of `parent`.
    pub fn from_entry(parent: &DirectoryNode, entry: &Entry) -> Self {
        FileEntry {
            name: entry.name.clone(),
            path: path::join(parent.path(), &entry.name),
            size: entry.size.unwrap_or(0),
            media_type: path::media_type(&entry.name),
            parent: parent.path().to_string(),
            modified: entry.modified,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// DePath of the containing directory.
    pub fn parent_path(&self) -> &str {
        &self.parent
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

/// Either kind of tree member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileOrDir {
    Directory(Arc<DirectoryNode>),
    File(FileEntry),
}

impl FileOrDir {
    pub fn kind(&self) -> EntryKind {
        match self {
            FileOrDir::Directory(_) => EntryKind::Directory,
            FileOrDir::File(_) => EntryKind::File,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FileOrDir::Directory(dir) => dir.name(),
            FileOrDir::File(file) => file.name(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileOrDir::Directory(dir) => dir.path(),
            FileOrDir::File(file) => file.path(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileOrDir::Directory(_))
    }

    pub fn as_directory(&self) -> Option<&Arc<DirectoryNode>> {
        match self {
            FileOrDir::Directory(dir) => Some(dir),
            FileOrDir::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            FileOrDir::Directory(_) => None,
            FileOrDir::File(file) => Some(file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_directory() {
        let root = DirectoryNode::root("dfs://0xabc");
        assert_eq!(root.name(), "0xabc");
        assert_eq!(root.path(), "");
        assert!(root.parent_path().is_none());
        assert!(root.is_root());
    }

    #[test]
    fn test_child_directory_paths() {
        let root = DirectoryNode::root("0xabc");
        let docs = DirectoryNode::child(&root, "docs");
        let drafts = DirectoryNode::child(&docs, "drafts");

        assert_eq!(docs.path(), "docs");
        assert_eq!(docs.parent_path(), Some(""));
        assert_eq!(drafts.path(), "docs/drafts");
        assert_eq!(drafts.parent_path(), Some("docs"));
        assert!(!drafts.is_root());
    }

    #[test]
    fn test_file_from_entry() {
        let root = DirectoryNode::root("0xabc");
        let docs = DirectoryNode::child(&root, "docs");
        let entry = Entry::file("0xabc/docs/a.txt".into(), "a.txt".into(), 42, None);

        let file = FileEntry::from_entry(&docs, &entry);
        assert_eq!(file.name(), "a.txt");
        assert_eq!(file.path(), "docs/a.txt");
        assert_eq!(file.size(), 42);
        assert_eq!(file.media_type(), "text/plain");
        assert_eq!(file.parent_path(), "docs");
    }

    #[test]
    fn test_file_or_dir_accessors() {
        let root = DirectoryNode::root("0xabc");
        let dir = FileOrDir::Directory(Arc::new(DirectoryNode::child(&root, "docs")));
        let entry = Entry::file("0xabc/a.png".into(), "a.png".into(), 1, None);
        let file = FileOrDir::File(FileEntry::from_entry(&root, &entry));

        assert_eq!(dir.kind(), EntryKind::Directory);
        assert_eq!(file.kind().as_str(), "file");
        assert!(dir.is_dir());
        assert!(dir.as_file().is_none());
        assert_eq!(file.as_file().map(|f| f.media_type()), Some("image/png"));
        assert_eq!(dir.path(), "docs");
    }

    #[test]
    fn test_serialized_kind_tag() {
        let root = DirectoryNode::root("0xabc");
        let dir = FileOrDir::Directory(Arc::new(DirectoryNode::child(&root, "docs")));
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["kind"], "directory");
        assert_eq!(json["path"], "docs");
    }
}
