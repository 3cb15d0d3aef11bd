//! # Fetch Cache
//!
//! Persistent mapping from a fetch key to the store object it resolved to.
//! Input schemes write an entry after materialising an input whose
//! fingerprint is stable, so a later fetch with the same fingerprint can
//! reuse the store object without archiving or hashing anything.
//!
//! Entries only ever point at store objects; a lookup whose object is no
//! longer valid in the store is treated as a miss.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::attrs::{Attr, Attrs};
use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::store::{Store, StorePath};

/// How a store object's content address was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentAddressMethod {
    /// Hash of a directory archive.
    NixArchive,
}

impl ContentAddressMethod {
    pub fn render(&self) -> &'static str {
        match self {
            Self::NixArchive => "nar",
        }
    }
}

/// Composite cache key: a domain plus a set of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub domain: String,
    pub attrs: Attrs,
}

impl CacheKey {
    /// Key for "this fingerprint was already copied to the store".
    pub fn fetch_to_store(
        name: &str,
        fingerprint: &str,
        method: ContentAddressMethod,
        path: &str,
    ) -> Self {
        let mut attrs = Attrs::new();
        attrs.insert("name".to_string(), Attr::from(name));
        attrs.insert("fingerprint".to_string(), Attr::from(fingerprint));
        attrs.insert("method".to_string(), Attr::from(method.render()));
        attrs.insert("path".to_string(), Attr::from(path));
        Self {
            domain: "fetchToStore".to_string(),
            attrs,
        }
    }
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub extra_attrs: Attrs,
    pub store_path: StorePath,
}

/// Interface to the fetch cache.
pub trait FetchCache: Send + Sync {
    /// Insert or replace the entry for `key`.
    fn upsert(
        &self,
        key: &CacheKey,
        store: &dyn Store,
        extra_attrs: Attrs,
        store_path: &StorePath,
    ) -> Result<()>;

    /// Look up `key`; misses if the recorded object is not valid in `store`.
    fn lookup_store_path(&self, key: &CacheKey, store: &dyn Store) -> Result<Option<CacheEntry>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredEntry {
    key: CacheKey,
    extra_attrs: Attrs,
    /// Full store path, so that a different store directory misses.
    store_path: String,
    timestamp: u64,
}

impl StoredEntry {
    fn new(key: &CacheKey, store: &dyn Store, extra_attrs: Attrs, store_path: &StorePath) -> Self {
        Self {
            key: key.clone(),
            extra_attrs,
            store_path: store.print_store_path(store_path),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    fn resolve(&self, store: &dyn Store) -> Result<Option<CacheEntry>> {
        let store_path = match store.maybe_parse_store_path(&self.store_path) {
            Some(sp) => sp,
            None => return Ok(None),
        };
        if !store.is_valid_path(&store_path)? {
            debug!("cache entry points to invalid path {}", self.store_path);
            return Ok(None);
        }
        Ok(Some(CacheEntry {
            extra_attrs: self.extra_attrs.clone(),
            store_path,
        }))
    }
}

/// In-process fetch cache
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<CacheKey, StoredEntry>>>,
}

impl MemoryCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, StoredEntry>>> {
        self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "fetch cache".to_string(),
        })
    }

    /// Check if a key exists in cache, regardless of store validity
    pub fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Clear all cached entries
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

impl FetchCache for MemoryCache {
    fn upsert(
        &self,
        key: &CacheKey,
        store: &dyn Store,
        extra_attrs: Attrs,
        store_path: &StorePath,
    ) -> Result<()> {
        let entry = StoredEntry::new(key, store, extra_attrs, store_path);
        self.lock()?.insert(key.clone(), entry);
        Ok(())
    }

    fn lookup_store_path(&self, key: &CacheKey, store: &dyn Store) -> Result<Option<CacheEntry>> {
        let entry = self.lock()?.get(key).cloned();
        match entry {
            Some(entry) => entry.resolve(store),
            None => Ok(None),
        }
    }
}

/// Fetch cache persisted as one JSON file per key.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open the cache in `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> Result<PathBuf> {
        let key_json = serde_json::to_vec(key)?;
        let name = ContentHash::sha256(&key_json).to_base16();
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

impl FetchCache for DiskCache {
    fn upsert(
        &self,
        key: &CacheKey,
        store: &dyn Store,
        extra_attrs: Attrs,
        store_path: &StorePath,
    ) -> Result<()> {
        let target = self.entry_path(key)?;
        let entry = StoredEntry::new(key, store, extra_attrs, store_path);
        let tmp = target.with_extension(format!("json.tmp-{}", std::process::id()));
        fs::write(&tmp, serde_json::to_vec_pretty(&entry)?).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &target).map_err(|e| Error::io(&target, e))?;
        debug!("cached {} -> {}", target.display(), entry.store_path);
        Ok(())
    }

    fn lookup_store_path(&self, key: &CacheKey, store: &dyn Store) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path, e)),
        };
        let entry: StoredEntry = serde_json::from_slice(&data).map_err(|e| Error::Cache {
            message: format!("corrupt cache entry {}: {}", path.display(), e),
        })?;
        if entry.key != *key {
            return Ok(None);
        }
        entry.resolve(store)
    }
}
