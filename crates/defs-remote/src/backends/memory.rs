use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use defs_core::{Backend, BackendError, Entry, Role, Signer};

use super::{check_owner, split_address, Ledger};

/// Whether a journal record marks the start or the end of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Start,
    Finish,
}

/// One line of the call journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub op: &'static str,
    pub path: String,
    pub phase: CallPhase,
}

#[derive(Default)]
struct Tree {
    /// Absolute paths of explicit directories. Address roots are implicit.
    dirs: BTreeSet<String>,
    files: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
}

impl Tree {
    fn is_dir(&self, path: &str) -> bool {
        !path.contains('/') || self.dirs.contains(path)
    }

    fn has_children(&self, path: &str) -> bool {
        let prefix = format!("{}/", path);
        self.dirs.range(prefix.clone()..).next().is_some_and(|d| d.starts_with(&prefix))
            || self
                .files
                .range(prefix.clone()..)
                .next()
                .is_some_and(|(f, _)| f.starts_with(&prefix))
    }

    /// Register every missing ancestor directory of `path`.
    fn create_ancestors(&mut self, path: &str) -> Result<(), BackendError> {
        let mut current = String::new();
        let components: Vec<&str> = path.split('/').collect();
        for (i, component) in components.iter().enumerate().take(components.len() - 1) {
            if i > 0 {
                current.push('/');
            }
            current.push_str(component);
            if i == 0 {
                continue;
            }
            if self.files.contains_key(&current) {
                return Err(BackendError::NotADirectory(current));
            }
            self.dirs.insert(current.clone());
        }
        Ok(())
    }
}

/// In-memory append-only backend for tests and demos.
///
/// Every call is recorded in a journal (start and finish), may sleep for a
/// configured latency in between, and can be made to fail on demand.
pub struct MemoryBackend {
    tree: RwLock<Tree>,
    ledger: Ledger,
    latency: Option<Duration>,
    journal: Mutex<Vec<CallRecord>>,
    failures: Mutex<Vec<(String, Option<String>)>>,
}

impl MemoryBackend {
    /// Create a new empty memory backend.
    pub fn new() -> Self {
        MemoryBackend {
            tree: RwLock::new(Tree::default()),
            ledger: Ledger::default(),
            latency: None,
            journal: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Create a backend that sleeps for `latency` inside every call.
    pub fn with_latency(latency: Duration) -> Self {
        MemoryBackend {
            latency: Some(latency),
            ..Self::new()
        }
    }

    /// Give `address` a role without going through a signer.
    pub fn grant_role(&self, role: Role, address: &str) {
        self.ledger.grant(role, address);
    }

    /// Store a file directly, creating its ancestors. Not journaled.
    pub fn seed_file(&self, path: &str, content: &[u8]) {
        let path = path.trim_matches('/').to_string();
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        let _ = tree.create_ancestors(&path);
        tree.files.insert(path, (content.to_vec(), Utc::now()));
    }

    /// Create a directory directly, with its ancestors. Not journaled.
    pub fn seed_dir(&self, path: &str) {
        let path = path.trim_matches('/').to_string();
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        let _ = tree.create_ancestors(&path);
        if path.contains('/') {
            tree.dirs.insert(path);
        }
    }

    /// Make every call of `op` fail; only for `path` when given.
    pub fn fail_on(&self, op: &str, path: Option<&str>) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.push((op.to_string(), path.map(|p| p.trim_matches('/').to_string())));
    }

    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Every recorded call, in order.
    pub fn journal(&self) -> Vec<CallRecord> {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Paths of the started calls of `op`, in order.
    pub fn calls(&self, op: &str) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|r| r.op == op && r.phase == CallPhase::Start)
            .map(|r| r.path)
            .collect()
    }

    /// Started mutating calls as `op path`, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|r| r.phase == CallPhase::Start && is_mutation(r.op))
            .map(|r| format!("{} {}", r.op, r.path))
            .collect()
    }

    pub fn clear_journal(&self) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn file_exists(&self, path: &str) -> bool {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        tree.files.contains_key(path.trim_matches('/'))
    }

    pub fn dir_exists(&self, path: &str) -> bool {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        tree.is_dir(path.trim_matches('/'))
    }

    /// Record the start of a call, apply latency, then check for an injected failure.
    async fn enter(&self, op: &'static str, path: &str) -> Result<(), BackendError> {
        self.record(op, path, CallPhase::Start);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let injected = failures
            .iter()
            .any(|(fop, fpath)| fop == op && fpath.as_deref().map_or(true, |p| p == path));
        if injected {
            drop(failures);
            self.record(op, path, CallPhase::Finish);
            return Err(BackendError::Other(format!(
                "injected failure: {} {}",
                op, path
            )));
        }
        Ok(())
    }

    fn record(&self, op: &'static str, path: &str, phase: CallPhase) {
        let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        journal.push(CallRecord {
            op,
            path: path.to_string(),
            phase,
        });
    }

    fn finish<T>(&self, op: &'static str, path: &str, result: Result<T, BackendError>) -> Result<T, BackendError> {
        self.record(op, path, CallPhase::Finish);
        result
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn is_mutation(op: &str) -> bool {
    matches!(
        op,
        "create_directory"
            | "delete_file"
            | "delete_directory"
            | "upload_file"
            | "reserve_space"
            | "grant_allocator_role"
    )
}

#[async_trait]
impl Backend for MemoryBackend {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn list_directory(&self, path: &str) -> Result<Vec<Entry>, BackendError> {
        let path = path.trim_matches('/');
        self.enter("list_directory", path).await?;

        let result = {
            let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
            if tree.files.contains_key(path) {
                Err(BackendError::NotADirectory(path.to_string()))
            } else if !tree.is_dir(path) {
                Err(BackendError::NotFound(path.to_string()))
            } else {
                let prefix = format!("{}/", path);
                let dirs = tree
                    .dirs
                    .iter()
                    .filter_map(|d| d.strip_prefix(&prefix).map(|name| (d, name)))
                    .filter(|(_, name)| !name.contains('/'))
                    .map(|(d, name)| Entry::dir(d.clone(), name.to_string(), None));
                let files = tree
                    .files
                    .iter()
                    .filter_map(|(f, meta)| f.strip_prefix(&prefix).map(|name| (f, name, meta)))
                    .filter(|(_, name, _)| !name.contains('/'))
                    .map(|(f, name, (content, modified))| {
                        Entry::file(f.clone(), name.to_string(), content.len() as u64, Some(*modified))
                    });
                // Raw listings come back in name order, kinds interleaved
                let mut entries: Vec<Entry> = dirs.chain(files).collect();
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                debug!(path = %path, count = entries.len(), "listed directory");
                Ok(entries)
            }
        };
        self.finish("list_directory", path, result)
    }

    #[instrument(skip(self, signer, _key), fields(backend = "memory"))]
    async fn create_directory(
        &self,
        signer: &Signer,
        path: &str,
        _key: Option<&str>,
    ) -> Result<String, BackendError> {
        let path = path.trim_matches('/');
        self.enter("create_directory", path).await?;

        let result = check_owner(signer, path).and_then(|_| {
            let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
            if !path.contains('/') {
                return Ok(path.to_string());
            }
            if tree.files.contains_key(path) {
                return Err(BackendError::AlreadyExists(path.to_string()));
            }
            tree.create_ancestors(path)?;
            tree.dirs.insert(path.to_string());
            Ok(path.to_string())
        });
        self.finish("create_directory", path, result)
    }

    #[instrument(skip(self, signer, _key), fields(backend = "memory"))]
    async fn delete_file(
        &self,
        signer: &Signer,
        path: &str,
        _key: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = path.trim_matches('/');
        self.enter("delete_file", path).await?;

        let result = check_owner(signer, path).and_then(|_| {
            let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
            tree.files
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| BackendError::NotFound(path.to_string()))
        });
        self.finish("delete_file", path, result)
    }

    #[instrument(skip(self, signer, _key), fields(backend = "memory"))]
    async fn delete_directory(
        &self,
        signer: &Signer,
        path: &str,
        _key: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = path.trim_matches('/');
        self.enter("delete_directory", path).await?;

        let result = check_owner(signer, path).and_then(|_| {
            let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
            if !path.contains('/') {
                return Err(BackendError::PermissionDenied(format!(
                    "cannot delete root {}",
                    path
                )));
            }
            if !tree.dirs.contains(path) {
                return Err(BackendError::NotFound(path.to_string()));
            }
            if tree.has_children(path) {
                return Err(BackendError::DirectoryNotEmpty(path.to_string()));
            }
            tree.dirs.remove(path);
            Ok(())
        });
        self.finish("delete_directory", path, result)
    }

    #[instrument(skip(self, signer, content, _key), fields(backend = "memory", size = content.len()))]
    async fn upload_file(
        &self,
        signer: &Signer,
        path: &str,
        content: &[u8],
        _key: Option<&str>,
    ) -> Result<String, BackendError> {
        let path = path.trim_matches('/');
        self.enter("upload_file", path).await?;

        let result = check_owner(signer, path).and_then(|_| {
            let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
            if !path.contains('/') || tree.dirs.contains(path) {
                return Err(BackendError::AlreadyExists(path.to_string()));
            }
            tree.create_ancestors(path)?;
            tree.files
                .insert(path.to_string(), (content.to_vec(), Utc::now()));
            Ok(path.to_string())
        });
        self.finish("upload_file", path, result)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn download_to_buffer(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let path = path.trim_matches('/');
        self.enter("download_to_buffer", path).await?;

        let result = {
            let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
            tree.files
                .get(path)
                .map(|(content, _)| content.clone())
                .ok_or_else(|| BackendError::NotFound(path.to_string()))
        };
        self.finish("download_to_buffer", path, result)
    }

    async fn get_occupied_space(&self, address: &str) -> Result<u64, BackendError> {
        let (address, _) = split_address(address);
        self.enter("get_occupied_space", address).await?;

        let occupied = {
            let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
            let prefix = format!("{}/", address);
            tree.files
                .iter()
                .filter(|(path, _)| path.starts_with(&prefix))
                .map(|(_, (content, _))| content.len() as u64)
                .sum()
        };
        self.finish("get_occupied_space", address, Ok(occupied))
    }

    async fn get_reserved_space(&self, address: &str) -> Result<u64, BackendError> {
        let (address, _) = split_address(address);
        self.enter("get_reserved_space", address).await?;
        let reserved = self.ledger.reserved(address);
        self.finish("get_reserved_space", address, Ok(reserved))
    }

    #[instrument(skip(self, signer), fields(backend = "memory"))]
    async fn reserve_space(
        &self,
        signer: &Signer,
        address: &str,
        amount: u64,
    ) -> Result<(), BackendError> {
        self.enter("reserve_space", address).await?;
        let result = self.ledger.require(Role::Allocator, signer).map(|_| {
            let total = self.ledger.reserve(address, amount);
            debug!(address = %address, total, "reserved space");
        });
        self.finish("reserve_space", address, result)
    }

    #[instrument(skip(self, signer), fields(backend = "memory"))]
    async fn grant_allocator_role(
        &self,
        signer: &Signer,
        address: &str,
    ) -> Result<(), BackendError> {
        self.enter("grant_allocator_role", address).await?;
        let result = self
            .ledger
            .require(Role::Admin, signer)
            .map(|_| self.ledger.grant(Role::Allocator, address));
        self.finish("grant_allocator_role", address, result)
    }

    async fn has_role(&self, role: Role, address: &str) -> Result<bool, BackendError> {
        self.enter("has_role", address).await?;
        let held = self.ledger.has_role(role, address);
        self.finish("has_role", address, Ok(held))
    }
}
