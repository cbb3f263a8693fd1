use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::error::Result;

/// Process-external key/value store for serialized rule buckets.
///
/// Implementations are injectable so hosts can point the engine at their own
/// cache tier. Payloads are opaque JSON strings; keys arrive already
/// namespaced by the resolver. Writes must be idempotent: concurrent warm-ups
/// of the same schema produce identical payloads and the last writer wins.
pub trait MetadataCache: Send + Sync {
    fn contains(&self, key: &str) -> Result<bool>;

    fn get(&self, key: &str) -> Result<Option<String>>;

    fn put(&self, key: &str, payload: String) -> Result<()>;

    /// External eviction hook for a single entry (schema change on one type).
    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Default in-process cache. Reads dominate and each key is written once per
/// schema revision, so a `RwLock<HashMap>` is enough.
#[derive(Debug, Default)]
pub struct InMemoryMetadataCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries.read()?.is_empty())
    }
}

impl MetadataCache for InMemoryMetadataCache {
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read()?.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn put(&self, key: &str, payload: String) -> Result<()> {
        self.entries.write()?.insert(key.to_string(), payload);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write()?.clear();
        Ok(())
    }
}
