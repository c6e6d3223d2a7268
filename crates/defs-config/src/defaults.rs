use crate::types::{sanitize_address, DefsConfig};

/// Default bound of the operation submission channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default subscriber backlog warning threshold.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

impl DefsConfig {
    /// Apply default inference rules to the configuration.
    /// This mutates the config in place.
    pub fn apply_defaults(&mut self) {
        // 1. An account with a key but no address signs as the target owner
        if let Some(account) = self.account.as_mut() {
            if account.address.is_none() && account.key.is_some() {
                account.address = Some(sanitize_address(&self.target.address));
            }
        }

        // 2. Queue bounds
        if self.queue.capacity.is_none() {
            self.queue.capacity = Some(DEFAULT_QUEUE_CAPACITY);
        }
        if self.queue.bus_capacity.is_none() {
            self.queue.bus_capacity = Some(DEFAULT_BUS_CAPACITY);
        }
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> DefsConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }

    /// Submission channel bound, falling back to the default.
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    /// Subscriber backlog warning threshold, falling back to the default.
    pub fn bus_capacity(&self) -> usize {
        self.queue.bus_capacity.unwrap_or(DEFAULT_BUS_CAPACITY)
    }
}
