//! Schedule cache with LRU eviction.
//!
//! Builds each distinct [`DiffusionConfig`] once and hands out shared,
//! read-only `Arc<NoiseSchedule>` handles keyed by the config fingerprint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::debug;

use super::builder::{build, NoiseSchedule};
use crate::error::Result;
use crate::types::DiffusionConfig;

/// Maximum number of schedules to keep in cache.
const DEFAULT_MAX_ENTRIES: usize = 16;

/// Thread-safe schedule cache with LRU eviction policy.
#[derive(Debug)]
pub struct ScheduleCache {
    /// Schedules indexed by config fingerprint.
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// Maximum number of entries to keep.
    max_entries: usize,
}

/// A cached schedule with access timestamp.
#[derive(Debug)]
struct CacheEntry {
    schedule: Arc<NoiseSchedule>,
    last_accessed: Instant,
}

impl ScheduleCache {
    /// Creates a new cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Creates a new cache with specified capacity (at least one entry).
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-built schedule
        // behind, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the schedule for `config`, building and caching it on a miss.
    ///
    /// Build failures are returned and nothing is cached.
    pub fn get_or_build(&self, config: &DiffusionConfig) -> Result<Arc<NoiseSchedule>> {
        let key = config.fingerprint();
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_accessed = Instant::now();
            debug!(fingerprint = %key, "schedule cache hit");
            return Ok(Arc::clone(&entry.schedule));
        }

        debug!(fingerprint = %key, "schedule cache miss");
        // Built under the lock: concurrent misses on one config build it once
        let schedule = Arc::new(build(config)?);

        // Evict if at capacity
        if entries.len() >= self.max_entries {
            Self::evict_lru(&mut entries);
        }

        entries.insert(
            key,
            CacheEntry {
                schedule: Arc::clone(&schedule),
                last_accessed: Instant::now(),
            },
        );

        Ok(schedule)
    }

    /// Checks if a schedule for `config` is cached.
    pub fn contains(&self, config: &DiffusionConfig) -> bool {
        self.lock().contains_key(&config.fingerprint())
    }

    /// Returns the number of cached schedules.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears all entries from the cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Evicts the least recently used entry.
    fn evict_lru(entries: &mut HashMap<String, CacheEntry>) {
        let oldest_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(k, _)| k.clone());

        if let Some(key) = oldest_key {
            debug!(fingerprint = %key, "evicting cached schedule");
            entries.remove(&key);
        }
    }
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::new()
    }
}
