//! Tag metadata cache
//!
//! Caches tag-identity lookups keyed by (taggable type, taggable id, ref).
//! Only metadata is cached; sample values are job-window specific and are
//! always fetched fresh. Misses are not cached, so a tag configured after a
//! failed lookup is found on the next computation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::{StoreError, TagValueStore};
use crate::types::{Tag, TagRef, TaggableType};

type TagKey = (TaggableType, u64, TagRef);

/// Bounded, shareable tag lookup cache
pub struct TagCache {
    entries: RwLock<HashMap<TagKey, Tag>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TagCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolve a tag through the cache, falling back to `store`.
    pub fn resolve(
        &self,
        store: &dyn TagValueStore,
        taggable_type: TaggableType,
        taggable_id: u64,
        tag_ref: TagRef,
    ) -> Result<Option<Tag>, StoreError> {
        let key = (taggable_type, taggable_id, tag_ref);

        if let Some(tag) = self.entries.read().ok().and_then(|e| e.get(&key).cloned()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(tag));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let found = store.get_tag(taggable_type, taggable_id, tag_ref)?;

        if let Some(tag) = &found {
            if let Ok(mut entries) = self.entries.write() {
                if entries.len() >= self.capacity {
                    tracing::debug!(capacity = self.capacity, "Tag cache full, clearing");
                    entries.clear();
                }
                entries.insert(key, tag.clone());
            }
        }

        Ok(found)
    }

    /// Resolve `tag_ref` on the machine first, then on the line.
    pub fn resolve_for_machine_or_line(
        &self,
        store: &dyn TagValueStore,
        machine_id: u64,
        line_id: u64,
        tag_ref: TagRef,
    ) -> Result<Option<Tag>, StoreError> {
        if let Some(tag) = self.resolve(store, TaggableType::Machine, machine_id, tag_ref)? {
            return Ok(Some(tag));
        }
        self.resolve(store, TaggableType::Line, line_id, tag_ref)
    }

    /// Drop one cached entry, e.g. after a tag is re-pointed
    pub fn invalidate(&self, taggable_type: TaggableType, taggable_id: u64, tag_ref: TagRef) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&(taggable_type, taggable_id, tag_ref));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> TagCacheStats {
        TagCacheStats {
            entries: self.entries.read().map(|e| e.len()).unwrap_or(0),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for TagCache {
    fn default() -> Self {
        Self::new(crate::config::defaults::DEFAULT_TAG_CACHE_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn tag(id: u64, taggable_type: TaggableType, taggable_id: u64, tag_ref: TagRef) -> Tag {
        Tag {
            id,
            taggable_type,
            taggable_id,
            tag_ref,
        }
    }

    #[test]
    fn test_hits_after_first_lookup() {
        let store = InMemoryStore::new();
        store.add_tag(tag(1, TaggableType::Machine, 3, TagRef::MachineState)).unwrap();
        let cache = TagCache::new(16);

        for _ in 0..3 {
            let found = cache.resolve(&store, TaggableType::Machine, 3, TagRef::MachineState).unwrap();
            assert_eq!(found.map(|t| t.id), Some(1));
        }
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let store = InMemoryStore::new();
        let cache = TagCache::new(16);
        assert!(cache.resolve(&store, TaggableType::Line, 2, TagRef::RejectCount).unwrap().is_none());

        store.add_tag(tag(9, TaggableType::Line, 2, TagRef::RejectCount)).unwrap();
        let found = cache.resolve(&store, TaggableType::Line, 2, TagRef::RejectCount).unwrap();
        assert_eq!(found.map(|t| t.id), Some(9));
    }

    #[test]
    fn test_machine_then_line_fallback() {
        let store = InMemoryStore::new();
        store.add_tag(tag(4, TaggableType::Line, 2, TagRef::BottleCount)).unwrap();
        let cache = TagCache::new(16);
        let found = cache.resolve_for_machine_or_line(&store, 3, 2, TagRef::BottleCount).unwrap();
        assert_eq!(found.map(|t| t.id), Some(4));

        store.add_tag(tag(5, TaggableType::Machine, 3, TagRef::BottleCount)).unwrap();
        let found = cache.resolve_for_machine_or_line(&store, 3, 2, TagRef::BottleCount).unwrap();
        assert_eq!(found.map(|t| t.id), Some(5));
    }

    #[test]
    fn test_capacity_bound_and_invalidate() {
        let store = InMemoryStore::new();
        for id in 0..5 {
            store.add_tag(tag(id, TaggableType::Machine, id, TagRef::CaseCount)).unwrap();
        }
        let cache = TagCache::new(2);
        for id in 0..5 {
            cache.resolve(&store, TaggableType::Machine, id, TagRef::CaseCount).unwrap();
        }
        assert!(cache.stats().entries <= 2);

        cache.invalidate(TaggableType::Machine, 4, TagRef::CaseCount);
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
