use dicomstore_core::{DictionaryTag, Level};
use dicomstore_search::TagCodec;
use indexmap::IndexMap;
use serde::Serialize;

/// One tag rendered as a physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDetails {
    pub display_name: String,
    pub column_name: String,
    pub column_type: String,
    pub is_indexed: bool,
}

/// Pending changes for one level. Every list keeps insertion order and
/// may hold the same tag more than once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LevelChanges {
    queryable_added: Vec<DictionaryTag>,
    queryable_removed: Vec<DictionaryTag>,
    storable_added: Vec<DictionaryTag>,
    storable_removed: Vec<DictionaryTag>,
    index_added: Vec<DictionaryTag>,
    index_removed: Vec<DictionaryTag>,
}

impl LevelChanges {
    fn is_empty(&self) -> bool {
        self.queryable_added.is_empty()
            && self.queryable_removed.is_empty()
            && self.storable_added.is_empty()
            && self.storable_removed.is_empty()
            && self.index_added.is_empty()
            && self.index_removed.is_empty()
    }
}

/// Column and index changes between two schemas, grouped by level.
///
/// Not synchronized; share it behind a lock if several threads fill it.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    codec: TagCodec,
    levels: IndexMap<Level, LevelChanges>,
}

impl SchemaDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render columns with `codec` instead of the default legacy naming.
    pub fn with_codec(mut self, codec: TagCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn add_queryable_column(&mut self, level: Level, tag: DictionaryTag) {
        tracing::trace!(level = %level, tag = %tag, "queryable column added");
        self.level_mut(level).queryable_added.push(tag);
    }

    pub fn remove_queryable_column(&mut self, level: Level, tag: DictionaryTag) {
        tracing::trace!(level = %level, tag = %tag, "queryable column removed");
        self.level_mut(level).queryable_removed.push(tag);
    }

    pub fn add_storable_column(&mut self, level: Level, tag: DictionaryTag) {
        tracing::trace!(level = %level, tag = %tag, "storable column added");
        self.level_mut(level).storable_added.push(tag);
    }

    pub fn remove_storable_column(&mut self, level: Level, tag: DictionaryTag) {
        tracing::trace!(level = %level, tag = %tag, "storable column removed");
        self.level_mut(level).storable_removed.push(tag);
    }

    pub fn add_index(&mut self, level: Level, tag: DictionaryTag) {
        tracing::trace!(level = %level, tag = %tag, "index added");
        self.level_mut(level).index_added.push(tag);
    }

    pub fn remove_index(&mut self, level: Level, tag: DictionaryTag) {
        tracing::trace!(level = %level, tag = %tag, "index removed");
        self.level_mut(level).index_removed.push(tag);
    }

    /// Any queryable column or index was added or removed on any level.
    pub fn is_schema_changed(&self) -> bool {
        self.levels.values().any(|c| {
            !c.queryable_added.is_empty()
                || !c.queryable_removed.is_empty()
                || !c.index_added.is_empty()
                || !c.index_removed.is_empty()
        })
    }

    /// A queryable column was added, or a storable column was added or
    /// removed, on any level.
    pub fn is_field_added_or_modified(&self) -> bool {
        self.levels.values().any(|c| {
            !c.queryable_added.is_empty()
                || !c.storable_added.is_empty()
                || !c.storable_removed.is_empty()
        })
    }

    pub fn storable_column_modified(&self, level: Level) -> bool {
        self.levels
            .get(&level)
            .is_some_and(|c| !c.storable_added.is_empty() || !c.storable_removed.is_empty())
    }

    /// Queryable columns added at `level`, indexed when the same tag is in
    /// the level's added indexes.
    pub fn get_added_columns(&self, level: Level) -> Vec<ColumnDetails> {
        self.levels
            .get(&level)
            .map(|c| self.render(&c.queryable_added, &c.index_added))
            .unwrap_or_default()
    }

    /// Queryable columns removed at `level`, indexed when the same tag is in
    /// the level's removed indexes.
    pub fn get_removed_columns(&self, level: Level) -> Vec<ColumnDetails> {
        self.levels
            .get(&level)
            .map(|c| self.render(&c.queryable_removed, &c.index_removed))
            .unwrap_or_default()
    }

    pub fn added_storable_columns(&self, level: Level) -> Vec<ColumnDetails> {
        self.levels
            .get(&level)
            .map(|c| self.render(&c.storable_added, &c.index_added))
            .unwrap_or_default()
    }

    pub fn removed_storable_columns(&self, level: Level) -> Vec<ColumnDetails> {
        self.levels
            .get(&level)
            .map(|c| self.render(&c.storable_removed, &c.index_removed))
            .unwrap_or_default()
    }

    pub fn added_indexes(&self, level: Level) -> Vec<ColumnDetails> {
        self.levels
            .get(&level)
            .map(|c| self.render(&c.index_added, &c.index_added))
            .unwrap_or_default()
    }

    pub fn removed_indexes(&self, level: Level) -> Vec<ColumnDetails> {
        self.levels
            .get(&level)
            .map(|c| self.render(&c.index_removed, &c.index_removed))
            .unwrap_or_default()
    }

    /// Levels with at least one pending change, in hierarchy order.
    pub fn levels(&self) -> Vec<Level> {
        Level::ALL
            .into_iter()
            .filter(|level| self.levels.get(level).is_some_and(|c| !c.is_empty()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(LevelChanges::is_empty)
    }

    fn level_mut(&mut self, level: Level) -> &mut LevelChanges {
        self.levels.entry(level).or_default()
    }

    fn render(&self, tags: &[DictionaryTag], indexed: &[DictionaryTag]) -> Vec<ColumnDetails> {
        tags.iter()
            .map(|tag| ColumnDetails {
                display_name: tag.name.clone(),
                column_name: self.codec.column_name(tag),
                column_type: TagCodec::column_type(tag),
                is_indexed: indexed.contains(tag),
            })
            .collect()
    }
}
