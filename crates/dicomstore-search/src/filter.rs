//! Query filter tree.
//!
//! Each operator carries only the fields it needs. Filters are built by the
//! caller and only read by the compiler.

use std::fmt;

use dicomstore_core::DictionaryTag;
use time::PrimitiveDateTime;

/// Operator kind of a [`QueryFilter`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    And,
    Or,
    MatchAll,
    MatchAny,
    MatchExactString,
    MatchExactDateTime,
    MatchRange,
    MatchGreaterThan,
    MatchLessThan,
    MatchWildCard,
    MatchSequence,
    Exists,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    And(Vec<QueryFilter>),
    Or(Vec<QueryFilter>),
    /// Universal match; emits no predicate.
    MatchAll { tag: Option<DictionaryTag> },
    /// Presence check; emits no predicate.
    Exists { tag: Option<DictionaryTag> },
    MatchAny {
        tag: DictionaryTag,
        values: Vec<String>,
    },
    MatchExactString {
        tag: DictionaryTag,
        value: String,
    },
    MatchExactDateTime {
        tag: DictionaryTag,
        value: PrimitiveDateTime,
    },
    MatchRange {
        tag: DictionaryTag,
        lower: Option<PrimitiveDateTime>,
        upper: Option<PrimitiveDateTime>,
    },
    MatchGreaterThan {
        tag: DictionaryTag,
        bound: Option<PrimitiveDateTime>,
    },
    MatchLessThan {
        tag: DictionaryTag,
        bound: Option<PrimitiveDateTime>,
    },
    /// DICOM wildcard pattern (`*`, `?`), `|`-separated alternatives.
    MatchWildCard {
        tag: DictionaryTag,
        pattern: String,
    },
    /// Sequence item matching. Not compiled into SQL.
    MatchSequence {
        tag: DictionaryTag,
        items: Vec<QueryFilter>,
    },
}

impl QueryFilter {
    pub fn and(children: Vec<QueryFilter>) -> Self {
        Self::And(children)
    }

    pub fn or(children: Vec<QueryFilter>) -> Self {
        Self::Or(children)
    }

    pub fn match_all() -> Self {
        Self::MatchAll { tag: None }
    }

    pub fn exists(tag: DictionaryTag) -> Self {
        Self::Exists { tag: Some(tag) }
    }

    pub fn match_any<I, S>(tag: DictionaryTag, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MatchAny {
            tag,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exact(tag: DictionaryTag, value: impl Into<String>) -> Self {
        Self::MatchExactString {
            tag,
            value: value.into(),
        }
    }

    pub fn exact_date_time(tag: DictionaryTag, value: PrimitiveDateTime) -> Self {
        Self::MatchExactDateTime { tag, value }
    }

    pub fn range(
        tag: DictionaryTag,
        lower: Option<PrimitiveDateTime>,
        upper: Option<PrimitiveDateTime>,
    ) -> Self {
        Self::MatchRange { tag, lower, upper }
    }

    pub fn greater_than(tag: DictionaryTag, bound: PrimitiveDateTime) -> Self {
        Self::MatchGreaterThan {
            tag,
            bound: Some(bound),
        }
    }

    pub fn less_than(tag: DictionaryTag, bound: PrimitiveDateTime) -> Self {
        Self::MatchLessThan {
            tag,
            bound: Some(bound),
        }
    }

    pub fn wildcard(tag: DictionaryTag, pattern: impl Into<String>) -> Self {
        Self::MatchWildCard {
            tag,
            pattern: pattern.into(),
        }
    }

    pub fn sequence(tag: DictionaryTag, items: Vec<QueryFilter>) -> Self {
        Self::MatchSequence { tag, items }
    }

    pub fn query_type(&self) -> QueryType {
        match self {
            Self::And(_) => QueryType::And,
            Self::Or(_) => QueryType::Or,
            Self::MatchAll { .. } => QueryType::MatchAll,
            Self::Exists { .. } => QueryType::Exists,
            Self::MatchAny { .. } => QueryType::MatchAny,
            Self::MatchExactString { .. } => QueryType::MatchExactString,
            Self::MatchExactDateTime { .. } => QueryType::MatchExactDateTime,
            Self::MatchRange { .. } => QueryType::MatchRange,
            Self::MatchGreaterThan { .. } => QueryType::MatchGreaterThan,
            Self::MatchLessThan { .. } => QueryType::MatchLessThan,
            Self::MatchWildCard { .. } => QueryType::MatchWildCard,
            Self::MatchSequence { .. } => QueryType::MatchSequence,
        }
    }

    /// The attribute a leaf filter targets. Combinators have none.
    pub fn tag(&self) -> Option<&DictionaryTag> {
        match self {
            Self::And(_) | Self::Or(_) => None,
            Self::MatchAll { tag } | Self::Exists { tag } => tag.as_ref(),
            Self::MatchAny { tag, .. }
            | Self::MatchExactString { tag, .. }
            | Self::MatchExactDateTime { tag, .. }
            | Self::MatchRange { tag, .. }
            | Self::MatchGreaterThan { tag, .. }
            | Self::MatchLessThan { tag, .. }
            | Self::MatchWildCard { tag, .. }
            | Self::MatchSequence { tag, .. } => Some(tag),
        }
    }

    pub fn is_combinator(&self) -> bool {
        matches!(self, Self::And(_) | Self::Or(_))
    }
}
