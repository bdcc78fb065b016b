//! Filter tree to WHERE-clause compiler.
//!
//! Compilation is a pre-order walk of the [`QueryFilter`] tree. Combinators
//! join the non-empty fragments of their children; leaves are validated
//! against the level's queryable tags and dispatched on their operator.
//!
//! Operators with no SQL rendering compile to an empty fragment, which the
//! enclosing combinator drops:
//!
//! - `MatchAll` and `Exists`
//! - `MatchSequence`
//! - `MatchRange`, `MatchGreaterThan`, `MatchLessThan` over non date/time VRs
//! - `MatchWildCard` over VRs other than PN, LO, IS, SH, US
//!
//! The compiler holds no mutable state. All bound values go to the caller's
//! [`ParamList`], whose indexer keeps parameter names unique for the whole
//! statement.

use std::sync::Arc;

use dicomstore_core::{
    DateFormatter, DicomDateFormatter, DictionaryTag, Level, ValueMultiplicity,
    ValueRepresentation, clean_person_name,
};
use time::PrimitiveDateTime;

use crate::dialect::Dialect;
use crate::filter::QueryFilter;
use crate::registry::TagProvider;
use crate::sql_builder::{CompileError, ParamList, and_group, escape_identifier, or_group};
use crate::tag_codec::TagCodec;

/// VRs that accept DICOM wildcard matching.
const WILDCARD_VRS: [ValueRepresentation; 5] = [
    ValueRepresentation::PN,
    ValueRepresentation::LO,
    ValueRepresentation::IS,
    ValueRepresentation::SH,
    ValueRepresentation::US,
];

/// Alternative separator inside one wildcard value.
const WILDCARD_ALTERNATIVE_SEPARATOR: char = '|';

/// A resolved leaf column.
struct Column<'a> {
    /// Unquoted name, used as the parameter stem.
    name: String,
    /// Bracket-quoted name, used in SQL text.
    quoted: String,
    tag: &'a DictionaryTag,
}

/// Compiles filter trees for one backing store.
#[derive(Clone)]
pub struct FilterCompiler {
    dialect: Dialect,
    codec: TagCodec,
    provider: Arc<dyn TagProvider>,
    formatter: Arc<dyn DateFormatter>,
}

impl FilterCompiler {
    pub fn new(dialect: Dialect, provider: Arc<dyn TagProvider>) -> Self {
        Self {
            dialect,
            codec: TagCodec::default(),
            provider,
            formatter: Arc::new(DicomDateFormatter),
        }
    }

    pub fn with_codec(mut self, codec: TagCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_date_formatter(mut self, formatter: Arc<dyn DateFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn codec(&self) -> &TagCodec {
        &self.codec
    }

    /// Compile `filter` for `level`, appending bound values to `params`.
    ///
    /// Returns the WHERE fragment, or an empty string when the filter does
    /// not restrict anything.
    pub fn compile(
        &self,
        filter: &QueryFilter,
        level: Level,
        params: &mut ParamList,
    ) -> Result<String, CompileError> {
        let fragment = self.compile_node(filter, level, params)?;
        tracing::debug!(
            level = %level,
            dialect = %self.dialect,
            params = params.len(),
            fragment = %fragment,
            "compiled filter"
        );
        Ok(fragment)
    }

    fn compile_node(
        &self,
        filter: &QueryFilter,
        level: Level,
        params: &mut ParamList,
    ) -> Result<String, CompileError> {
        match filter {
            QueryFilter::And(children) => {
                let parts = self.compile_children(children, level, params)?;
                Ok(and_group(&parts))
            }
            QueryFilter::Or(children) => {
                let parts = self.compile_children(children, level, params)?;
                Ok(or_group(&parts))
            }
            leaf => self.compile_leaf(leaf, level, params),
        }
    }

    fn compile_children(
        &self,
        children: &[QueryFilter],
        level: Level,
        params: &mut ParamList,
    ) -> Result<Vec<String>, CompileError> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            let fragment = self.compile_node(child, level, params)?;
            if !fragment.is_empty() {
                parts.push(fragment);
            }
        }
        Ok(parts)
    }

    fn compile_leaf(
        &self,
        filter: &QueryFilter,
        level: Level,
        params: &mut ParamList,
    ) -> Result<String, CompileError> {
        let column = match filter.tag() {
            Some(tag) => Some(self.resolve_column(tag, level)?),
            None => None,
        };

        let Some(column) = column else {
            // MatchAll / Exists without a tag
            return Ok(String::new());
        };

        let fragment = match filter {
            QueryFilter::MatchAll { .. } | QueryFilter::Exists { .. } => String::new(),

            QueryFilter::MatchAny { values, .. } => self.build_match_any(&column, values, params),

            QueryFilter::MatchExactString { value, .. } => {
                self.build_exact_string(&column, value, params)
            }

            QueryFilter::MatchExactDateTime { value, .. } => {
                self.build_exact_date_time(&column, value, params)
            }

            QueryFilter::MatchRange { lower, upper, .. } => {
                self.build_date_filter(filter, &column, lower.as_ref(), upper.as_ref(), params)
            }
            QueryFilter::MatchGreaterThan { bound, .. } => {
                self.build_date_filter(filter, &column, bound.as_ref(), None, params)
            }
            QueryFilter::MatchLessThan { bound, .. } => {
                self.build_date_filter(filter, &column, None, bound.as_ref(), params)
            }

            QueryFilter::MatchWildCard { pattern, .. } => {
                if WILDCARD_VRS.contains(&column.tag.vr) {
                    self.build_wildcard(&column, pattern, params)
                } else {
                    tracing::warn!(
                        column = %column.name,
                        vr = %column.tag.vr,
                        "wildcard matching not supported for this VR; filter ignored"
                    );
                    String::new()
                }
            }

            QueryFilter::MatchSequence { .. } => {
                tracing::warn!(
                    column = %column.name,
                    "sequence matching is not compiled to SQL; filter ignored"
                );
                String::new()
            }

            QueryFilter::And(_) | QueryFilter::Or(_) => String::new(),
        };

        Ok(fragment)
    }

    fn resolve_column<'a>(
        &self,
        tag: &'a DictionaryTag,
        level: Level,
    ) -> Result<Column<'a>, CompileError> {
        if !self.provider.is_queryable(level, tag) {
            tracing::warn!(level = %level, tag = %tag, "filter references non-queryable tag");
            return Err(CompileError::invalid_queryable_tag(level, tag));
        }
        let name = self.codec.column_name(tag);
        let quoted = escape_identifier(&name)?;
        Ok(Column { name, quoted, tag })
    }

    fn build_match_any(
        &self,
        column: &Column<'_>,
        values: &[String],
        params: &mut ParamList,
    ) -> String {
        let parts: Vec<String> = values
            .iter()
            .map(|value| self.build_equals_or_contains(column, value.clone(), params))
            .collect();
        or_group(&parts)
    }

    fn build_exact_string(
        &self,
        column: &Column<'_>,
        value: &str,
        params: &mut ParamList,
    ) -> String {
        let value = if column.tag.vr == ValueRepresentation::PN {
            clean_person_name(value)
        } else {
            value.to_string()
        };
        self.build_equals_or_contains(column, value, params)
    }

    /// `=` for single-valued columns, `LIKE %value%` for delimited lists.
    fn build_equals_or_contains(
        &self,
        column: &Column<'_>,
        value: String,
        params: &mut ParamList,
    ) -> String {
        match column.tag.vm {
            ValueMultiplicity::One => {
                let p = params.bind(&column.name, value);
                format!("{} = {p}", column.quoted)
            }
            ValueMultiplicity::Many => {
                let p = params.bind(&column.name, format!("%{value}%"));
                format!("{} LIKE {p}", column.quoted)
            }
        }
    }

    fn build_exact_date_time(
        &self,
        column: &Column<'_>,
        value: &PrimitiveDateTime,
        params: &mut ParamList,
    ) -> String {
        let p = self.bind_date(column, value, params);
        format!("{} = {}", column.quoted, self.dialect.cast_date_param(&p))
    }

    fn build_date_filter(
        &self,
        filter: &QueryFilter,
        column: &Column<'_>,
        lower: Option<&PrimitiveDateTime>,
        upper: Option<&PrimitiveDateTime>,
        params: &mut ParamList,
    ) -> String {
        if !column.tag.vr.is_date_time() {
            tracing::warn!(
                column = %column.name,
                vr = %column.tag.vr,
                query_type = %filter.query_type(),
                "range matching only applies to date/time VRs; filter ignored"
            );
            return String::new();
        }
        self.build_range(column, lower, upper, params)
    }

    /// Date range fragment. Missing bounds are open ends; with no bound at
    /// all the range does not filter.
    fn build_range(
        &self,
        column: &Column<'_>,
        lower: Option<&PrimitiveDateTime>,
        upper: Option<&PrimitiveDateTime>,
        params: &mut ParamList,
    ) -> String {
        match (lower, upper) {
            (None, None) => {
                tracing::debug!(column = %column.name, "range has no bounds; ignored");
                String::new()
            }
            (None, Some(high)) => {
                let p = self.bind_date(column, high, params);
                format!("{} <= {}", column.quoted, self.dialect.cast_date_param(&p))
            }
            (Some(low), None) => {
                let p = self.bind_date(column, low, params);
                format!("{} >= {}", column.quoted, self.dialect.cast_date_param(&p))
            }
            (Some(low), Some(high)) => {
                let p_low = self.bind_date(column, low, params);
                let p_high = self.bind_date(column, high, params);
                format!(
                    "{} BETWEEN {} AND {}",
                    column.quoted,
                    self.dialect.cast_date_param(&p_low),
                    self.dialect.cast_date_param(&p_high)
                )
            }
        }
    }

    fn bind_date(
        &self,
        column: &Column<'_>,
        value: &PrimitiveDateTime,
        params: &mut ParamList,
    ) -> String {
        let formatted = self.formatter.format(Some(value), column.tag);
        let formatted = self.dialect.normalize_date_value(formatted);
        params.bind(&column.name, formatted)
    }

    /// Wildcard fragment: escape literal `_`/`%`, translate `*`→`%` and
    /// `?`→`_`, then emit one LIKE per `|` alternative.
    fn build_wildcard(&self, column: &Column<'_>, pattern: &str, params: &mut ParamList) -> String {
        let escaped = self.dialect.escape_like_literal(pattern);
        let converted = escaped.replace('*', "%").replace('?', "_");

        let parts: Vec<String> = converted
            .split(WILDCARD_ALTERNATIVE_SEPARATOR)
            .map(|alternative| {
                let p = params.bind(&column.name, alternative);
                self.dialect.like_predicate(&column.quoted, &p)
            })
            .collect();

        match parts.as_slice() {
            [single] => single.clone(),
            _ => or_group(&parts),
        }
    }
}

impl std::fmt::Debug for FilterCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCompiler")
            .field("dialect", &self.dialect)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
