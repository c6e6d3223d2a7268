//! Preconditions checked before an operation is queued.

use defs_core::{Backend, Role, Signer, VfsError};

/// The connected signer, or [`VfsError::NoAccount`].
pub fn require_signer(signer: Option<Signer>) -> Result<Signer, VfsError> {
    signer.ok_or(VfsError::NoAccount)
}

/// The signer must own `address`.
pub fn require_owner(signer: &Signer, address: &str) -> Result<(), VfsError> {
    if signer.is_owner_of(address) {
        Ok(())
    } else {
        Err(VfsError::NotAuthorized(format!(
            "{} is not the owner of {}",
            signer, address
        )))
    }
}

/// The signer must hold `role` according to the backend.
pub async fn require_role(
    backend: &dyn Backend,
    signer: &Signer,
    role: Role,
) -> Result<(), VfsError> {
    if backend.has_role(role, signer.address()).await? {
        Ok(())
    } else {
        Err(VfsError::NotAuthorized(format!(
            "{} does not hold the {} role",
            signer, role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;

    #[test]
    fn test_require_signer() {
        assert!(matches!(require_signer(None), Err(VfsError::NoAccount)));
        assert!(require_signer(Some(Signer::new("0xabc"))).is_ok());
    }

    #[test]
    fn test_require_owner() {
        let signer = Signer::new("0xAbC");
        assert!(require_owner(&signer, "0xabc").is_ok());
        assert!(matches!(
            require_owner(&signer, "0xdef"),
            Err(VfsError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_require_role() {
        let backend = MemoryBackend::new();
        let signer = Signer::new("0xabc");

        let err = require_role(&backend, &signer, Role::Allocator).await.unwrap_err();
        assert!(err.to_string().contains("allocator"));

        backend.grant_role(Role::Allocator, "0xabc");
        assert!(require_role(&backend, &signer, Role::Allocator).await.is_ok());
    }
}
