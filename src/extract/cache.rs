// File: src/extract/cache.rs
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Identity of an item for tag caching: its id when it has one, otherwise a
/// hash of its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Id(String),
    Content(String),
}

impl CacheKey {
    pub fn for_item(id: Option<&str>, subject: &str, body: &str) -> Self {
        match id.filter(|id| !id.is_empty()) {
            Some(id) => CacheKey::Id(id.to_string()),
            None => {
                let mut hasher = Sha256::new();
                hasher.update(subject.as_bytes());
                hasher.update([0u8]);
                hasher.update(body.as_bytes());
                CacheKey::Content(hex::encode(hasher.finalize()))
            }
        }
    }
}

/// Bounded in-memory cache of extracted tags. Least recently used entries
/// are evicted first; nothing survives a restart.
pub struct TagCache {
    entries: Mutex<LruCache<CacheKey, Vec<String>>>,
}

impl TagCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<String>> {
        let mut entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, tags: Vec<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, tags);
        }
    }

    /// Cached tags for `key`, computing and storing them on a miss.
    pub fn get_or_insert_with(&self, key: CacheKey, f: impl FnOnce() -> Vec<String>) -> Vec<String> {
        if let Some(tags) = self.get(&key) {
            return tags;
        }
        let tags = f();
        self.insert(key, tags.clone());
        tags
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
