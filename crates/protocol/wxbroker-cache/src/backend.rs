//! Cache backends.
//!
//! The broker stores serialized credentials through [`CacheBackend`], so the
//! storage can be swapped (in-process map, shared key-value store) without
//! touching the single-flight logic.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::error::{CacheError, CacheResult};

// =============================================================================
// Backend Trait
// =============================================================================

/// Key-value storage with optional per-entry TTL.
pub trait CacheBackend: Send + Sync {
    /// Load a value. Expired entries read as `None`.
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value, replacing any previous one.
    ///
    /// `ttl` is in seconds; `None` keeps the entry until it is deleted.
    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> CacheResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> CacheResult<()>;
}

// =============================================================================
// In-memory Backend
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local backend.
///
/// Reads take a shared lock; expired entries are hidden on read and dropped
/// by [`purge_expired`](Self::purge_expired) or the next write to the key.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::lock_poisoned("memory cache lock poisoned"))?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now();
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::lock_poisoned("memory cache lock poisoned"))?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| self.clock.now().saturating_add(ttl));
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::lock_poisoned("memory cache lock poisoned"))?;
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::lock_poisoned("memory cache lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// File Backend
// =============================================================================

/// Backend persisted to a single JSON file.
///
/// Every operation reads the file and writes it back through a temporary file
/// and a rename, so separate processes see each other's entries. Writers in
/// different processes are not serialized; the last rename wins.
pub struct FileCache {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileCache {
    /// Open (or lazily create) the cache file at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> CacheResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            clock,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CacheResult<HashMap<String, Entry>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, Entry>) -> CacheResult<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Saved cache file");
        Ok(())
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut HashMap<String, Entry>) -> T,
    ) -> CacheResult<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| CacheError::lock_poisoned("file cache lock poisoned"))?;
        let mut entries = self.load()?;
        let now = self.clock.now();
        entries.retain(|_, entry| entry.is_live(now));
        let result = apply(&mut entries);
        self.save(&entries)?;
        Ok(result)
    }
}

impl CacheBackend for FileCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| CacheError::lock_poisoned("file cache lock poisoned"))?;
        let now = self.clock.now();
        Ok(self
            .load()?
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| self.clock.now().saturating_add(ttl));
        self.update(|entries| {
            entries.insert(key.to_string(), Entry { value, expires_at });
        })
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
