mod fs;
mod memory;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use defs_config::BackendConfig;
use defs_core::{Backend, BackendError, Role, Signer};

pub use fs::FsBackend;
pub use memory::{CallPhase, CallRecord, MemoryBackend};

/// Build the backend named by the configuration.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    match config {
        BackendConfig::Fs(fs) => {
            let root = fs
                .root
                .as_deref()
                .ok_or_else(|| BackendError::Other("fs backend requires 'root'".to_string()))?;
            Ok(Arc::new(FsBackend::new(root)?))
        }
        BackendConfig::Memory(memory) => {
            let backend = match &memory.latency {
                Some(latency) => MemoryBackend::with_latency(latency.as_duration()),
                None => MemoryBackend::new(),
            };
            Ok(Arc::new(backend))
        }
    }
}

/// Split an absolute path into its address and the remainder.
pub(crate) fn split_address(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.split_once('/') {
        Some((address, rest)) => (address, rest),
        None => (path, ""),
    }
}

/// Mutations are only accepted from the owner of the address being written.
pub(crate) fn check_owner(signer: &Signer, path: &str) -> Result<(), BackendError> {
    let (address, _) = split_address(path);
    if signer.is_owner_of(address) {
        Ok(())
    } else {
        Err(BackendError::PermissionDenied(format!(
            "{} does not own {}",
            signer, address
        )))
    }
}

/// Role assignments and space reservations kept in process.
#[derive(Default)]
pub(crate) struct Ledger {
    roles: RwLock<HashMap<Role, HashSet<String>>>,
    reserved: RwLock<HashMap<String, u64>>,
}

impl Ledger {
    pub(crate) fn grant(&self, role: Role, address: &str) {
        let mut roles = self.roles.write().unwrap_or_else(|e| e.into_inner());
        roles.entry(role).or_default().insert(key(address));
    }

    pub(crate) fn has_role(&self, role: Role, address: &str) -> bool {
        let roles = self.roles.read().unwrap_or_else(|e| e.into_inner());
        roles
            .get(&role)
            .is_some_and(|holders| holders.contains(&key(address)))
    }

    pub(crate) fn require(&self, role: Role, signer: &Signer) -> Result<(), BackendError> {
        if self.has_role(role, signer.address()) {
            Ok(())
        } else {
            Err(BackendError::PermissionDenied(format!(
                "{} lacks the {} role",
                signer, role
            )))
        }
    }

    pub(crate) fn reserve(&self, address: &str, amount: u64) -> u64 {
        let mut reserved = self.reserved.write().unwrap_or_else(|e| e.into_inner());
        let total = reserved.entry(key(address)).or_insert(0);
        *total = total.saturating_add(amount);
        *total
    }

    pub(crate) fn reserved(&self, address: &str) -> u64 {
        let reserved = self.reserved.read().unwrap_or_else(|e| e.into_inner());
        reserved.get(&key(address)).copied().unwrap_or(0)
    }
}

fn key(address: &str) -> String {
    defs_config::sanitize_address(address).to_ascii_lowercase()
}
