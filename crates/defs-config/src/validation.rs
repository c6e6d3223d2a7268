use crate::types::{BackendConfig, DefsConfig};
use crate::ConfigError;

impl DefsConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        // Target address must survive prefix stripping
        let address = self.target.sanitized_address();
        if address.is_empty() {
            errors.push(ConfigError::InvalidAddress(
                self.target.address.clone(),
                "Address is empty after removing the protocol prefix".to_string(),
            ));
        } else if address.contains('/') || address.chars().any(char::is_whitespace) {
            errors.push(ConfigError::InvalidAddress(
                self.target.address.clone(),
                "Address must not contain '/' or whitespace".to_string(),
            ));
        }

        // Fs backend needs a root directory
        if let BackendConfig::Fs(fs) = &self.backend {
            if fs.root.as_deref().map(str::trim).unwrap_or("").is_empty() {
                errors.push(ConfigError::MissingBackendField(
                    "fs".to_string(),
                    "root".to_string(),
                ));
            }
        }

        // Zero-capacity channels cannot carry anything
        if self.queue.capacity == Some(0) {
            errors.push(ConfigError::InvalidQueue(
                "capacity".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if self.queue.bus_capacity == Some(0) {
            errors.push(ConfigError::InvalidQueue(
                "bus_capacity".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // An account needs something to sign with
        if let Some(account) = &self.account {
            if account.address.is_none() && account.key.is_none() {
                errors.push(ConfigError::InvalidConfig(
                    "account requires an address or a key".to_string(),
                ));
            }
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
