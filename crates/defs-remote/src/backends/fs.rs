use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, instrument};

use defs_core::{Backend, BackendError, Entry, Role, Signer};

use super::{check_owner, split_address, Ledger};

/// Local directory standing in for remote storage.
///
/// An absolute path `<address>/<depath>` maps to `<root>/<address>/<depath>`.
/// Roles and reservations live in process and are lost on drop.
pub struct FsBackend {
    root: PathBuf,
    ledger: Ledger,
}

impl FsBackend {
    /// Create a new filesystem backend rooted at the given path.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, BackendError> {
        let root = root.as_ref();

        // Create the directory if it doesn't exist
        if !root.exists() {
            std::fs::create_dir_all(root).map_err(BackendError::Io)?;
        }
        let root = root.canonicalize().map_err(|e| {
            BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to canonicalize root path: {}", e),
            ))
        })?;

        Ok(FsBackend {
            root,
            ledger: Ledger::default(),
        })
    }

    /// Give `address` a role without going through a signer.
    pub fn grant_role(&self, role: Role, address: &str) {
        self.ledger.grant(role, address);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an absolute storage path under the root, preventing directory traversal.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, BackendError> {
        let trimmed = path.trim_matches('/');
        let rel = Path::new(trimmed);

        for component in rel.components() {
            match component {
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(BackendError::PathTraversal(trimmed.to_string()));
                }
                _ => {}
            }
        }

        let full_path = self.root.join(rel);

        // The nearest existing ancestor must resolve under root (symlinks)
        let mut ancestor = full_path.as_path();
        while !ancestor.exists() {
            match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => break,
            }
        }
        let canonical_ancestor = ancestor.canonicalize().map_err(BackendError::Io)?;
        if !canonical_ancestor.starts_with(&self.root) {
            return Err(BackendError::PathTraversal(trimmed.to_string()));
        }

        Ok(full_path)
    }
}

fn not_found_or_io(path: &str) -> impl FnOnce(std::io::Error) -> BackendError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BackendError::NotFound(path.to_string())
        } else {
            BackendError::Io(e)
        }
    }
}

async fn is_empty_dir(path: &Path) -> Result<bool, BackendError> {
    let mut read_dir = fs::read_dir(path).await.map_err(BackendError::Io)?;
    Ok(read_dir
        .next_entry()
        .await
        .map_err(BackendError::Io)?
        .is_none())
}

#[async_trait]
impl Backend for FsBackend {
    #[instrument(skip(self), fields(backend = "fs"))]
    async fn list_directory(&self, path: &str) -> Result<Vec<Entry>, BackendError> {
        let path = path.trim_matches('/');
        let full_path = self.resolve_path(path)?;

        if !full_path.exists() {
            // An address with nothing stored yet is an empty root
            if !path.contains('/') {
                return Ok(Vec::new());
            }
            return Err(BackendError::NotFound(path.to_string()));
        }
        if !full_path.is_dir() {
            return Err(BackendError::NotADirectory(path.to_string()));
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&full_path).await.map_err(BackendError::Io)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(BackendError::Io)? {
            let metadata = entry.metadata().await.map_err(BackendError::Io)?;
            let name = entry.file_name().to_string_lossy().to_string();
            let entry_path = format!("{}/{}", path, name);
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

            if metadata.is_dir() {
                entries.push(Entry::dir(entry_path, name, modified));
            } else {
                entries.push(Entry::file(entry_path, name, metadata.len(), modified));
            }
        }

        debug!(path = %path, count = entries.len(), "listed directory");
        Ok(entries)
    }

    #[instrument(skip(self, signer, _key), fields(backend = "fs"))]
    async fn create_directory(
        &self,
        signer: &Signer,
        path: &str,
        _key: Option<&str>,
    ) -> Result<String, BackendError> {
        let path = path.trim_matches('/');
        check_owner(signer, path)?;
        let full_path = self.resolve_path(path)?;

        if full_path.is_file() {
            return Err(BackendError::AlreadyExists(path.to_string()));
        }
        fs::create_dir_all(&full_path)
            .await
            .map_err(BackendError::Io)?;
        Ok(path.to_string())
    }

    #[instrument(skip(self, signer, _key), fields(backend = "fs"))]
    async fn delete_file(
        &self,
        signer: &Signer,
        path: &str,
        _key: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = path.trim_matches('/');
        check_owner(signer, path)?;
        let full_path = self.resolve_path(path)?;

        if full_path.is_dir() {
            return Err(BackendError::NotFound(path.to_string()));
        }
        fs::remove_file(&full_path)
            .await
            .map_err(not_found_or_io(path))
    }

    #[instrument(skip(self, signer, _key), fields(backend = "fs"))]
    async fn delete_directory(
        &self,
        signer: &Signer,
        path: &str,
        _key: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = path.trim_matches('/');
        check_owner(signer, path)?;
        if !path.contains('/') {
            return Err(BackendError::PermissionDenied(format!(
                "cannot delete root {}",
                path
            )));
        }
        let full_path = self.resolve_path(path)?;

        if !full_path.is_dir() {
            return Err(BackendError::NotFound(path.to_string()));
        }
        if !is_empty_dir(&full_path).await? {
            return Err(BackendError::DirectoryNotEmpty(path.to_string()));
        }
        fs::remove_dir(&full_path)
            .await
            .map_err(not_found_or_io(path))
    }

    #[instrument(skip(self, signer, content, _key), fields(backend = "fs", size = content.len()))]
    async fn upload_file(
        &self,
        signer: &Signer,
        path: &str,
        content: &[u8],
        _key: Option<&str>,
    ) -> Result<String, BackendError> {
        let path = path.trim_matches('/');
        check_owner(signer, path)?;
        let full_path = self.resolve_path(path)?;

        if !path.contains('/') || full_path.is_dir() {
            return Err(BackendError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(BackendError::Io)?;
        }
        fs::write(&full_path, content)
            .await
            .map_err(BackendError::Io)?;
        Ok(path.to_string())
    }

    #[instrument(skip(self), fields(backend = "fs"))]
    async fn download_to_buffer(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let path = path.trim_matches('/');
        let full_path = self.resolve_path(path)?;
        if full_path.is_dir() {
            return Err(BackendError::NotFound(path.to_string()));
        }
        fs::read(&full_path).await.map_err(not_found_or_io(path))
    }

    async fn get_occupied_space(&self, address: &str) -> Result<u64, BackendError> {
        let (address, _) = split_address(address);
        let base = self.resolve_path(address)?;
        if !base.exists() {
            return Ok(0);
        }

        let mut total = 0u64;
        let mut pending = vec![base];
        while let Some(dir) = pending.pop() {
            let mut read_dir = fs::read_dir(&dir).await.map_err(BackendError::Io)?;
            while let Some(entry) = read_dir.next_entry().await.map_err(BackendError::Io)? {
                let metadata = entry.metadata().await.map_err(BackendError::Io)?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }
        Ok(total)
    }

    async fn get_reserved_space(&self, address: &str) -> Result<u64, BackendError> {
        let (address, _) = split_address(address);
        Ok(self.ledger.reserved(address))
    }

    #[instrument(skip(self, signer), fields(backend = "fs"))]
    async fn reserve_space(
        &self,
        signer: &Signer,
        address: &str,
        amount: u64,
    ) -> Result<(), BackendError> {
        self.ledger.require(Role::Allocator, signer)?;
        self.ledger.reserve(address, amount);
        Ok(())
    }

    #[instrument(skip(self, signer), fields(backend = "fs"))]
    async fn grant_allocator_role(
        &self,
        signer: &Signer,
        address: &str,
    ) -> Result<(), BackendError> {
        self.ledger.require(Role::Admin, signer)?;
        self.ledger.grant(Role::Allocator, address);
        Ok(())
    }

    async fn has_role(&self, role: Role, address: &str) -> Result<bool, BackendError> {
        Ok(self.ledger.has_role(role, address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend() -> (TempDir, FsBackend) {
        let temp_dir = TempDir::new().unwrap();
        let backend = FsBackend::new(temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[tokio::test]
    async fn test_upload_lands_under_address() {
        let (temp_dir, backend) = backend();
        let signer = Signer::new("0xabc");

        let stored = backend
            .upload_file(&signer, "0xabc/docs/a.txt", b"hello", None)
            .await
            .unwrap();

        assert_eq!(stored, "0xabc/docs/a.txt");
        assert!(temp_dir.path().join("0xabc/docs/a.txt").is_file());
        assert_eq!(
            backend.download_to_buffer("0xabc/docs/a.txt").await.unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_list_empty_address_root() {
        let (_temp_dir, backend) = backend();
        assert!(backend.list_directory("0xabc").await.unwrap().is_empty());
        assert!(matches!(
            backend.list_directory("0xabc/missing").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_paths_are_absolute() {
        let (_temp_dir, backend) = backend();
        let signer = Signer::new("0xabc");
        backend.create_directory(&signer, "0xabc/docs", None).await.unwrap();

        let entries = backend.list_directory("0xabc").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "0xabc/docs");
        assert!(entries[0].is_dir);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (_temp_dir, backend) = backend();
        let result = backend.download_to_buffer("0xabc/../../etc/passwd").await;
        assert!(matches!(result, Err(BackendError::PathTraversal(_))));
    }

    #[tokio::test]
    async fn test_delete_directory_requires_empty() {
        let (_temp_dir, backend) = backend();
        let signer = Signer::new("0xabc");
        backend
            .upload_file(&signer, "0xabc/d/x.txt", b"x", None)
            .await
            .unwrap();

        assert!(matches!(
            backend.delete_directory(&signer, "0xabc/d", None).await,
            Err(BackendError::DirectoryNotEmpty(_))
        ));
        backend.delete_file(&signer, "0xabc/d/x.txt", None).await.unwrap();
        backend.delete_directory(&signer, "0xabc/d", None).await.unwrap();
        assert!(backend.list_directory("0xabc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_occupied_space_is_recursive() {
        let (_temp_dir, backend) = backend();
        let signer = Signer::new("0xabc");
        backend.upload_file(&signer, "0xabc/a.txt", b"123", None).await.unwrap();
        backend.upload_file(&signer, "0xabc/d/e/b.txt", b"45", None).await.unwrap();

        assert_eq!(backend.get_occupied_space("0xabc").await.unwrap(), 5);
        assert_eq!(backend.get_occupied_space("0xdef").await.unwrap(), 0);
    }
}
