pub mod config;
pub mod find;
pub mod get;
pub mod grant;
pub mod ls;
pub mod mkdir;
pub mod put;
pub mod rm;
pub mod space;
pub mod stat;
pub mod status;
pub mod tree;
pub mod watch;

use std::sync::Arc;

use defs_core::{path, DirectoryNode, FileOrDir, OperationEvent};
use defs_remote::DirectoryManager;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Resolve a user-supplied path (leading `/` optional) or fail with a message.
pub async fn resolve(
    manager: &DirectoryManager,
    path: &str,
) -> Result<FileOrDir, Box<dyn std::error::Error>> {
    let depath = path::normalize(path);
    manager
        .resolve_path(&depath)
        .await?
        .ok_or_else(|| format!("No such file or directory: /{}", depath).into())
}

/// Resolve a directory; `None` means the root.
pub async fn resolve_directory(
    manager: &DirectoryManager,
    path: Option<&str>,
) -> Result<Arc<DirectoryNode>, Box<dyn std::error::Error>> {
    match path {
        None => Ok(manager.root_directory()),
        Some(path) => match resolve(manager, path).await? {
            FileOrDir::Directory(dir) => Ok(dir),
            FileOrDir::File(file) => Err(format!("Not a directory: /{}", file.path()).into()),
        },
    }
}

pub fn print_event(event: &OperationEvent) {
    println!("#{} {} {}", event.id, event.kind, event.result.outcome);
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}G", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}M", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use defs_core::Signer;
    use defs_remote::{ManagerOptions, MemoryBackend};

    pub(crate) fn fixture() -> (Arc<MemoryBackend>, DirectoryManager) {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_file("0xabc/docs/notes.txt", b"notes");
        backend.seed_file("0xabc/readme.md", b"# readme");
        let manager = DirectoryManager::new(
            backend.clone(),
            "0xabc",
            Some(Signer::new("0xabc")),
            ManagerOptions::default(),
        );
        (backend, manager)
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0K");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0M");
    }

    #[tokio::test]
    async fn test_resolve_directory() {
        let (_backend, manager) = fixture();

        let root = resolve_directory(&manager, None).await.unwrap();
        assert!(root.is_root());

        let docs = resolve_directory(&manager, Some("/docs/")).await.unwrap();
        assert_eq!(docs.path(), "docs");

        let err = resolve_directory(&manager, Some("readme.md")).await.unwrap_err();
        assert!(err.to_string().contains("Not a directory"));

        let err = resolve(&manager, "missing").await.unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }
}
