//! ORDER BY compilation.

use std::sync::Arc;

use dicomstore_core::{DictionaryTag, Level};
use serde::{Deserialize, Serialize};

use crate::registry::TagProvider;
use crate::sql_builder::{CompileError, escape_identifier};
use crate::tag_codec::TagCodec;

/// Direction applied to the whole ORDER BY list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuerySortOrder {
    #[default]
    None,
    Ascending,
    Descending,
}

impl QuerySortOrder {
    pub fn as_sql(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Ascending => Some("ASC"),
            Self::Descending => Some("DESC"),
        }
    }
}

#[derive(Clone)]
pub struct SortCompiler {
    codec: TagCodec,
    provider: Arc<dyn TagProvider>,
}

impl SortCompiler {
    pub fn new(provider: Arc<dyn TagProvider>) -> Self {
        Self {
            codec: TagCodec::default(),
            provider,
        }
    }

    pub fn with_codec(mut self, codec: TagCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Compile the ORDER BY list (without the keyword).
    ///
    /// Tags that are not queryable at `level` are dropped. When none remain
    /// the result is empty and no direction is emitted.
    pub fn compile_order_by(
        &self,
        level: Level,
        sort_tags: &[DictionaryTag],
        order: QuerySortOrder,
    ) -> Result<String, CompileError> {
        let mut columns = Vec::with_capacity(sort_tags.len());
        for tag in sort_tags {
            if !self.provider.is_queryable(level, tag) {
                tracing::debug!(level = %level, tag = %tag, "sort tag not queryable; dropped");
                continue;
            }
            let column = escape_identifier(&self.codec.column_name(tag))?;
            columns.push(if tag.vr.is_integer() {
                format!("CAST({column} AS INT)")
            } else if tag.vr.is_wide_integer() {
                format!("CAST({column} AS BIGINT)")
            } else {
                column
            });
        }

        if columns.is_empty() {
            return Ok(String::new());
        }

        let mut clause = columns.join(", ");
        if let Some(direction) = order.as_sql() {
            clause.push(' ');
            clause.push_str(direction);
        }
        Ok(clause)
    }
}

impl std::fmt::Debug for SortCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortCompiler")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
