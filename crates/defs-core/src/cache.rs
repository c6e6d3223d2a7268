use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::traits::{sort_dirs_first, Entry};

/// Configuration for the listing cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { enabled: true }
    }
}

impl From<&defs_config::CacheSettings> for CacheConfig {
    fn from(settings: &defs_config::CacheSettings) -> Self {
        CacheConfig {
            enabled: settings.enabled,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of listings currently cached.
    pub entries: usize,
    /// Number of single-path invalidations.
    pub invalidations: u64,
    /// Number of full purges.
    pub purges: u64,
    /// Number of fetched listings discarded because an invalidation raced them.
    pub stale_discards: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Listings plus the clock stamps of the invalidations that touched them.
#[derive(Default)]
struct Listings {
    entries: HashMap<String, Vec<Entry>>,
    /// Path -> stamp of its latest single-path invalidation.
    invalidated: HashMap<String, u64>,
    /// Path -> stamp of its latest subtree invalidation.
    evicted: HashMap<String, u64>,
    /// Stamp of the latest full purge.
    purged: u64,
}

impl Listings {
    /// Latest invalidation stamp covering `path`: its own, a subtree
    /// eviction of it or of any ancestor, or a purge.
    fn stamp_of(&self, path: &str) -> u64 {
        let mut stamp = self.purged;
        if let Some(s) = self.invalidated.get(path) {
            stamp = stamp.max(*s);
        }
        let mut prefix = path;
        loop {
            if let Some(s) = self.evicted.get(prefix) {
                stamp = stamp.max(*s);
            }
            match prefix.rsplit_once('/') {
                Some((parent, _)) => prefix = parent,
                None => break,
            }
        }
        stamp
    }
}

/// Absolute path -> raw directory listing.
///
/// Every invalidation takes a stamp from a monotonic clock and records it
/// against the paths it covers. A listing fetched under an older clock value
/// is refused by [`ListingCache::insert`] only if one of those stamps covers
/// its own path, so a read that started before a mutation settled cannot
/// repopulate the cache with pre-mutation contents, while reads of
/// unrelated directories are kept.
pub struct ListingCache {
    config: CacheConfig,
    listings: RwLock<Listings>,
    clock: AtomicU64,
    stats: RwLock<CacheStats>,
}

impl ListingCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        ListingCache {
            config,
            listings: RwLock::new(Listings::default()),
            clock: AtomicU64::new(0),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Current invalidation clock. Capture it before fetching a listing.
    pub fn epoch(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Next stamp. Only called while holding the listings write lock.
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Get a cached listing, directories first.
    pub async fn get(&self, path: &str) -> Option<Vec<Entry>> {
        if !self.config.enabled {
            trace!(path = %path, "cache disabled, skipping lookup");
            return None;
        }

        let listings = self.listings.read().await;
        let mut stats = self.stats.write().await;

        match listings.entries.get(path) {
            Some(listing) => {
                stats.hits += 1;
                debug!(path = %path, entries = listing.len(), "listing cache hit");
                let mut listing = listing.clone();
                sort_dirs_first(&mut listing);
                Some(listing)
            }
            None => {
                stats.misses += 1;
                trace!(path = %path, "listing cache miss");
                None
            }
        }
    }

    /// Store a listing fetched under `epoch`.
    ///
    /// Returns false if `path` was invalidated, evicted or purged since.
    pub async fn insert(&self, path: &str, listing: Vec<Entry>, epoch: u64) -> bool {
        if !self.config.enabled {
            return false;
        }

        let mut listings = self.listings.write().await;
        let mut stats = self.stats.write().await;

        // Checked under the write lock; invalidations stamp while holding it too
        if listings.stamp_of(path) > epoch {
            stats.stale_discards += 1;
            debug!(path = %path, "discarding listing fetched before an invalidation");
            return false;
        }

        listings.entries.insert(path.to_string(), listing);
        stats.entries = listings.entries.len();
        trace!(path = %path, total_entries = stats.entries, "cached listing");
        true
    }

    /// Drop the listing of one path.
    pub async fn invalidate(&self, path: &str) -> bool {
        let mut listings = self.listings.write().await;
        let mut stats = self.stats.write().await;

        let stamp = self.tick();
        listings.invalidated.insert(path.to_string(), stamp);
        stats.invalidations += 1;
        let removed = listings.entries.remove(path).is_some();
        stats.entries = listings.entries.len();
        debug!(path = %path, removed, "invalidated listing");
        removed
    }

    /// Drop the listings of a path and every path below it.
    pub async fn invalidate_prefix(&self, path: &str) -> usize {
        let mut listings = self.listings.write().await;
        let mut stats = self.stats.write().await;

        let stamp = self.tick();
        listings.evicted.insert(path.to_string(), stamp);
        stats.invalidations += 1;
        let before = listings.entries.len();
        let nested = format!("{}/", path);
        listings
            .entries
            .retain(|key, _| key != path && !key.starts_with(&nested));
        stats.entries = listings.entries.len();
        before - listings.entries.len()
    }

    /// Drop every listing.
    pub async fn clear(&self) {
        let mut listings = self.listings.write().await;
        let mut stats = self.stats.write().await;

        // The purge stamp supersedes every per-path stamp
        listings.purged = self.tick();
        listings.invalidated.clear();
        listings.evicted.clear();
        listings.entries.clear();
        stats.entries = 0;
        stats.purges += 1;
        debug!("purged listing cache");
    }

    /// Check if a path is cached (without touching stats).
    pub async fn contains(&self, path: &str) -> bool {
        self.listings.read().await.entries.contains_key(path)
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

/// Thread-safe shared cache.
pub type SharedCache = Arc<ListingCache>;
