//! Per-level queryable and storable tag registry.
//!
//! The registry is the allow-list the filter and sort compilers validate
//! against, and the source of the storable column list selected by the
//! statement assembler.
//!
//! Levels are sharded in a DashMap; updating one level never blocks readers
//! of another.

use dashmap::DashMap;
use dicomstore_core::{DictionaryTag, Level};
use indexmap::IndexSet;

/// Supplies the queryable and storable tags of each level.
pub trait TagProvider: Send + Sync {
    /// Tags that may appear in filters and sort requests at `level`.
    fn queryable_tags(&self, level: Level) -> Vec<DictionaryTag>;

    /// Tags stored as columns of the `level` table, in select order.
    fn storable_tags(&self, level: Level) -> Vec<DictionaryTag>;

    fn is_queryable(&self, level: Level, tag: &DictionaryTag) -> bool {
        self.queryable_tags(level).contains(tag)
    }
}

#[derive(Debug, Default, Clone)]
struct LevelTags {
    queryable: IndexSet<DictionaryTag>,
    storable: IndexSet<DictionaryTag>,
}

/// Thread-safe registry of tags per level, insertion-ordered within a level.
#[derive(Debug, Default)]
pub struct QueryableTagRegistry {
    levels: DashMap<Level, LevelTags>,
}

impl QueryableTagRegistry {
    pub fn new() -> Self {
        Self {
            levels: DashMap::new(),
        }
    }

    /// Register a queryable tag. Re-registering keeps the original position.
    pub fn register_queryable(&self, level: Level, tag: DictionaryTag) {
        self.levels.entry(level).or_default().queryable.insert(tag);
    }

    /// Register a storable (selected) column.
    pub fn register_storable(&self, level: Level, tag: DictionaryTag) {
        self.levels.entry(level).or_default().storable.insert(tag);
    }

    /// Remove a tag from both lists of a level.
    ///
    /// Returns true if the tag was registered.
    pub fn remove(&self, level: Level, tag: &DictionaryTag) -> bool {
        match self.levels.get_mut(&level) {
            Some(mut entry) => {
                let queryable = entry.queryable.shift_remove(tag);
                let storable = entry.storable.shift_remove(tag);
                queryable || storable
            }
            None => false,
        }
    }

    /// Drop every tag of a level.
    pub fn clear_level(&self, level: Level) {
        self.levels.remove(&level);
    }

    pub fn count_for_level(&self, level: Level) -> usize {
        self.levels
            .get(&level)
            .map(|entry| entry.queryable.len())
            .unwrap_or(0)
    }

    /// Total number of queryable registrations across levels.
    pub fn len(&self) -> usize {
        self.levels.iter().map(|entry| entry.queryable.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TagProvider for QueryableTagRegistry {
    fn queryable_tags(&self, level: Level) -> Vec<DictionaryTag> {
        self.levels
            .get(&level)
            .map(|entry| entry.queryable.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn storable_tags(&self, level: Level) -> Vec<DictionaryTag> {
        self.levels
            .get(&level)
            .map(|entry| entry.storable.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn is_queryable(&self, level: Level, tag: &DictionaryTag) -> bool {
        self.levels
            .get(&level)
            .is_some_and(|entry| entry.queryable.contains(tag))
    }
}
