use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// One raw descriptor from a backend directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Full (absolute) backend path of the entry.
    pub path: String,
    /// Name of the entry (filename or directory name).
    pub name: String,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (None for directories).
    pub size: Option<u64>,
    /// Last modification time, when the backend reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl Entry {
    /// Create a new file entry.
    pub fn file(path: String, name: String, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Entry {
            path,
            name,
            is_dir: false,
            size: Some(size),
            modified,
        }
    }

    /// Create a new directory entry.
    pub fn dir(path: String, name: String, modified: Option<DateTime<Utc>>) -> Self {
        Entry {
            path,
            name,
            is_dir: true,
            size: None,
            modified,
        }
    }
}

/// Stable directories-first ordering; relative order within each group is kept.
pub fn sort_dirs_first(entries: &mut [Entry]) {
    entries.sort_by_key(|e| !e.is_dir);
}

/// The account that authorizes mutating backend calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    address: String,
}

impl Signer {
    pub fn new(address: impl Into<String>) -> Self {
        Signer {
            address: defs_config::sanitize_address(&address.into()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Case-insensitive address comparison, ignoring protocol prefixes.
    pub fn is_owner_of(&self, address: &str) -> bool {
        self.address
            .eq_ignore_ascii_case(&defs_config::sanitize_address(address))
    }
}

impl fmt::Display for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Roles a backend can grant to an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May reserve storage space.
    Allocator,
    /// May grant roles to other addresses.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Allocator => "allocator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract of the append-only remote storage.
///
/// Paths are absolute: `<address>/<relative path>`, with the bare address
/// naming the root. There is no move or rename; every call may fail with an
/// opaque network or contract error.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// List the entries of a directory.
    async fn list_directory(&self, path: &str) -> Result<Vec<Entry>, BackendError>;

    /// Create a directory and return its path.
    async fn create_directory(
        &self,
        signer: &Signer,
        path: &str,
        key: Option<&str>,
    ) -> Result<String, BackendError>;

    /// Delete a single file.
    async fn delete_file(
        &self,
        signer: &Signer,
        path: &str,
        key: Option<&str>,
    ) -> Result<(), BackendError>;

    /// Delete a directory.
    async fn delete_directory(
        &self,
        signer: &Signer,
        path: &str,
        key: Option<&str>,
    ) -> Result<(), BackendError>;

    /// Store a file and return its path.
    async fn upload_file(
        &self,
        signer: &Signer,
        path: &str,
        content: &[u8],
        key: Option<&str>,
    ) -> Result<String, BackendError>;

    /// Read a file into memory.
    async fn download_to_buffer(&self, path: &str) -> Result<Vec<u8>, BackendError>;

    /// Bytes currently stored under an address.
    async fn get_occupied_space(&self, address: &str) -> Result<u64, BackendError>;

    /// Bytes reserved for an address.
    async fn get_reserved_space(&self, address: &str) -> Result<u64, BackendError>;

    /// Reserve additional space for an address.
    async fn reserve_space(
        &self,
        signer: &Signer,
        address: &str,
        amount: u64,
    ) -> Result<(), BackendError>;

    /// Grant the allocator role to an address.
    async fn grant_allocator_role(&self, signer: &Signer, address: &str)
        -> Result<(), BackendError>;

    /// Check whether an address holds a role.
    async fn has_role(&self, role: Role, address: &str) -> Result<bool, BackendError>;
}
