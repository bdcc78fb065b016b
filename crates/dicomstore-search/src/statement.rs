//! SELECT / COUNT statement assembly.
//!
//! The WHERE clause is always built in the same order so that a select and
//! a count over the same request bind identical parameters:
//!
//! 1. device id (always present)
//! 2. completed flag (when only completed rows are requested)
//! 3. parent key (when the parent identifier is not a dummy)
//! 4. the compiled filter (when it is not empty)
//!
//! Row limiting only applies to sorted queries: SQL Server selects
//! `TOP(n)`, SQLite appends `LIMIT n`. A cap without sort criteria returns
//! every matching row.

use std::sync::Arc;

use dicomstore_core::{DateFormatter, DictionaryTag, Identifier, Level};

use crate::compiler::FilterCompiler;
use crate::dialect::Dialect;
use crate::filter::QueryFilter;
use crate::registry::TagProvider;
use crate::sort::{QuerySortOrder, SortCompiler};
use crate::sql_builder::{
    BuiltQuery, CompileError, ParamList, SqlValue, escape_identifier, or_group,
};
use crate::tag_codec::TagCodec;

pub const DEVICE_ID_COLUMN: &str = "deviceId";
pub const COMPLETED_COLUMN: &str = "completed";
pub const UID_COLUMN: &str = "uid";
pub const PARENT_UID_COLUMN: &str = "parUid";

/// Which columns a select returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnSelection {
    /// Key columns plus the level's storable tag columns.
    #[default]
    Storables,
    AllColumns,
    InstanceUidsOnly,
}

/// Everything a select or count statement is built from.
#[derive(Debug, Clone)]
pub struct SelectRequest {
    pub level: Level,
    pub parent: Identifier,
    pub filter: Option<QueryFilter>,
    pub sort_tags: Vec<DictionaryTag>,
    pub sort_order: QuerySortOrder,
    pub max_records: usize,
    pub columns: ColumnSelection,
    pub device_id: i64,
    pub only_completed: bool,
}

impl SelectRequest {
    pub fn new(level: Level, device_id: i64) -> Self {
        Self {
            level,
            parent: Identifier::dummy(),
            filter: None,
            sort_tags: Vec::new(),
            sort_order: QuerySortOrder::None,
            max_records: 0,
            columns: ColumnSelection::Storables,
            device_id,
            only_completed: false,
        }
    }

    pub fn with_parent(mut self, parent: Identifier) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort_by(mut self, tags: Vec<DictionaryTag>, order: QuerySortOrder) -> Self {
        self.sort_tags = tags;
        self.sort_order = order;
        self
    }

    pub fn max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = columns;
        self
    }

    pub fn only_completed(mut self) -> Self {
        self.only_completed = true;
        self
    }
}

/// Builds full statements for one backing store.
#[derive(Clone)]
pub struct StatementAssembler {
    dialect: Dialect,
    codec: TagCodec,
    provider: Arc<dyn TagProvider>,
    filters: FilterCompiler,
    sorter: SortCompiler,
}

impl StatementAssembler {
    pub fn new(dialect: Dialect, provider: Arc<dyn TagProvider>) -> Self {
        Self {
            dialect,
            codec: TagCodec::default(),
            filters: FilterCompiler::new(dialect, Arc::clone(&provider)),
            sorter: SortCompiler::new(Arc::clone(&provider)),
            provider,
        }
    }

    pub fn with_codec(mut self, codec: TagCodec) -> Self {
        self.codec = codec;
        self.filters = self.filters.with_codec(codec);
        self.sorter = self.sorter.with_codec(codec);
        self
    }

    pub fn with_date_formatter(mut self, formatter: Arc<dyn DateFormatter>) -> Self {
        self.filters = self.filters.with_date_formatter(formatter);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn filter_compiler(&self) -> &FilterCompiler {
        &self.filters
    }

    pub fn sort_compiler(&self) -> &SortCompiler {
        &self.sorter
    }

    /// Build the SELECT statement for a request.
    pub fn build_select(&self, request: &SelectRequest) -> Result<BuiltQuery, CompileError> {
        let mut params = ParamList::new();
        let table = escape_identifier(request.level.table_name())?;
        let where_clause = self.build_where_clause(request, &mut params)?;
        let order_by = self.sorter.compile_order_by(
            request.level,
            &request.sort_tags,
            request.sort_order,
        )?;
        let sorted = !order_by.is_empty();

        let top = if sorted {
            self.dialect.top_clause(request.max_records)
        } else {
            None
        };

        let select_list = match (top, request.columns) {
            (Some(top), _) => format!("{top} {}", self.storable_columns(request.level)?),
            (None, ColumnSelection::AllColumns) => "*".to_string(),
            (None, ColumnSelection::InstanceUidsOnly) => escape_identifier(UID_COLUMN)?,
            (None, ColumnSelection::Storables) => self.storable_columns(request.level)?,
        };

        let mut sql = format!("SELECT {select_list} FROM {table} WHERE {where_clause}");

        if sorted {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by);

            if let Some(limit) = self.dialect.limit_clause(request.max_records) {
                sql.push(' ');
                sql.push_str(&limit);
            }
        } else if request.max_records > 0 {
            tracing::debug!(
                level = %request.level,
                max_records = request.max_records,
                "record cap ignored for unsorted query"
            );
        }

        tracing::debug!(
            level = %request.level,
            dialect = %self.dialect,
            params = params.len(),
            sql = %sql,
            "built select statement"
        );

        Ok(BuiltQuery {
            sql,
            params: params.into_params(),
        })
    }

    /// Build the COUNT statement for a request. Sort, cap and column
    /// selection are ignored.
    pub fn build_count(&self, request: &SelectRequest) -> Result<BuiltQuery, CompileError> {
        let mut params = ParamList::new();
        let table = escape_identifier(request.level.table_name())?;
        let where_clause = self.build_where_clause(request, &mut params)?;
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {where_clause}");

        tracing::debug!(
            level = %request.level,
            dialect = %self.dialect,
            params = params.len(),
            "built count statement"
        );

        Ok(BuiltQuery {
            sql,
            params: params.into_params(),
        })
    }

    fn build_where_clause(
        &self,
        request: &SelectRequest,
        params: &mut ParamList,
    ) -> Result<String, CompileError> {
        let mut conditions = Vec::with_capacity(4);

        let p = params.bind(DEVICE_ID_COLUMN, SqlValue::Integer(request.device_id));
        conditions.push(format!("{} = {p}", escape_identifier(DEVICE_ID_COLUMN)?));

        if request.only_completed {
            let p = params.bind(COMPLETED_COLUMN, SqlValue::Boolean(true));
            conditions.push(format!("{} = {p}", escape_identifier(COMPLETED_COLUMN)?));
        }

        if let Some(parent) = self.build_parent_clause(request.level, &request.parent, params)? {
            conditions.push(parent);
        }

        if let Some(filter) = &request.filter {
            let fragment = self.filters.compile(filter, request.level, params)?;
            if !fragment.is_empty() {
                conditions.push(fragment);
            }
        }

        Ok(conditions.join(" AND "))
    }

    /// Restrict rows to the children of `parent`.
    fn build_parent_clause(
        &self,
        level: Level,
        parent: &Identifier,
        params: &mut ParamList,
    ) -> Result<Option<String>, CompileError> {
        if parent.is_dummy() {
            return Ok(None);
        }

        match level {
            Level::Patient => {
                Self::single_key_clause(UID_COLUMN, &parent.patient_key, params)
            }
            Level::Study => {
                Self::single_key_clause(PARENT_UID_COLUMN, &parent.patient_key, params)
            }
            Level::Series => {
                let column = escape_identifier(PARENT_UID_COLUMN)?;
                let parts: Vec<String> = parent
                    .study_uids()
                    .map(|uid| {
                        let p = params.bind(PARENT_UID_COLUMN, uid);
                        format!("{column} = {p}")
                    })
                    .collect();
                Ok(if parts.is_empty() {
                    None
                } else {
                    Some(or_group(&parts))
                })
            }
            other => Err(CompileError::UnsupportedLevel(other)),
        }
    }

    fn single_key_clause(
        column: &str,
        key: &str,
        params: &mut ParamList,
    ) -> Result<Option<String>, CompileError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        let p = params.bind(column, key);
        Ok(Some(format!("{} = {p}", escape_identifier(column)?)))
    }

    /// Key columns followed by the level's storable tag columns.
    fn storable_columns(&self, level: Level) -> Result<String, CompileError> {
        let mut columns = vec![escape_identifier(UID_COLUMN)?];
        if level.parent().is_some() {
            columns.push(escape_identifier(PARENT_UID_COLUMN)?);
        }
        for tag in self.provider.storable_tags(level) {
            columns.push(escape_identifier(&self.codec.column_name(&tag))?);
        }
        Ok(columns.join(", "))
    }
}

impl std::fmt::Debug for StatementAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementAssembler")
            .field("dialect", &self.dialect)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::QueryableTagRegistry;
    use dicomstore_core::{ValueMultiplicity, ValueRepresentation};

    fn tag(id: u32, vr: ValueRepresentation) -> DictionaryTag {
        DictionaryTag::new(id, vr, ValueMultiplicity::One, "")
    }

    fn accession() -> DictionaryTag {
        tag(0x0008_0050, ValueRepresentation::SH)
    }

    fn series_number() -> DictionaryTag {
        tag(0x0020_0011, ValueRepresentation::IS)
    }

    fn assembler(dialect: Dialect) -> StatementAssembler {
        let registry = QueryableTagRegistry::new();
        registry.register_queryable(Level::Study, accession());
        registry.register_storable(Level::Study, accession());
        registry.register_queryable(Level::Series, series_number());
        registry.register_storable(Level::Series, series_number());
        StatementAssembler::new(dialect, Arc::new(registry))
    }

    #[test]
    fn test_minimal_select() {
        let query = assembler(Dialect::SqlServer)
            .build_select(&SelectRequest::new(Level::Study, 3))
            .unwrap();
        assert_eq!(
            query.sql,
            "SELECT [uid], [parUid], [tag_00080050] FROM [Study] WHERE [deviceId] = @deviceId_0"
        );
        assert_eq!(query.params.len(), 1);
        assert_eq!(query.params[0].value, SqlValue::Integer(3));
    }

    #[test]
    fn test_where_clause_order() {
        let request = SelectRequest::new(Level::Study, 1)
            .only_completed()
            .with_parent(Identifier::for_patient("PAT1"))
            .with_filter(QueryFilter::exact(accession(), "A1"));
        let query = assembler(Dialect::SqlServer).build_select(&request).unwrap();
        assert_eq!(
            query.where_clause(),
            Some(
                "[deviceId] = @deviceId_0 AND [completed] = @completed_1 AND [parUid] = @parUid_2 AND [tag_00080050] = @tag_00080050_3"
            )
        );
        assert_eq!(query.params[2].value, SqlValue::Text("PAT1".into()));
    }

    #[test]
    fn test_patient_parent_uses_uid() {
        let request =
            SelectRequest::new(Level::Patient, 1).with_parent(Identifier::for_patient("PAT1"));
        let query = assembler(Dialect::SqlServer).build_count(&request).unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(*) FROM [Patient] WHERE [deviceId] = @deviceId_0 AND [uid] = @uid_1"
        );
    }

    #[test]
    fn test_series_parent_ors_study_uids() {
        let request = SelectRequest::new(Level::Series, 1)
            .with_parent(Identifier::for_study("PAT1", "1.2.3\\1.2.4"));
        let query = assembler(Dialect::Sqlite).build_count(&request).unwrap();
        assert_eq!(
            query.where_clause(),
            Some("[deviceId] = @deviceId_0 AND ( [parUid] = @parUid_1 OR [parUid] = @parUid_2 )")
        );
    }

    #[test]
    fn test_dummy_parent_and_empty_filter_leave_no_dangling_and() {
        let request = SelectRequest::new(Level::Series, 1)
            .with_parent(Identifier::dummy())
            .with_filter(QueryFilter::match_all());
        let query = assembler(Dialect::SqlServer).build_count(&request).unwrap();
        assert_eq!(query.where_clause(), Some("[deviceId] = @deviceId_0"));
    }

    #[test]
    fn test_image_parent_is_unsupported() {
        let request = SelectRequest::new(Level::Image, 1)
            .with_parent(Identifier::new("PAT1", "1.2", "1.2.3"));
        let err = assembler(Dialect::SqlServer).build_select(&request).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedLevel(Level::Image)));
    }

    #[test]
    fn test_column_selection_policy() {
        let asm = assembler(Dialect::SqlServer);

        let all = asm
            .build_select(&SelectRequest::new(Level::Study, 1).columns(ColumnSelection::AllColumns))
            .unwrap();
        assert!(all.sql.starts_with("SELECT * FROM [Study]"));

        let uids = asm
            .build_select(
                &SelectRequest::new(Level::Study, 1).columns(ColumnSelection::InstanceUidsOnly),
            )
            .unwrap();
        assert!(uids.sql.starts_with("SELECT [uid] FROM [Study]"));

        // TOP(n) wins over the requested selection.
        let top = asm
            .build_select(
                &SelectRequest::new(Level::Study, 1)
                    .columns(ColumnSelection::AllColumns)
                    .sort_by(vec![accession()], QuerySortOrder::Ascending)
                    .max_records(25),
            )
            .unwrap();
        assert_eq!(
            top.sql,
            "SELECT TOP(25) [uid], [parUid], [tag_00080050] FROM [Study] WHERE [deviceId] = @deviceId_0 ORDER BY [tag_00080050] ASC"
        );
    }

    #[test]
    fn test_sqlite_limit_requires_sort() {
        let asm = assembler(Dialect::Sqlite);

        let sorted = asm
            .build_select(
                &SelectRequest::new(Level::Series, 1)
                    .sort_by(vec![series_number()], QuerySortOrder::Descending)
                    .max_records(10),
            )
            .unwrap();
        assert!(sorted
            .sql
            .ends_with("ORDER BY CAST([tag_00200011] AS INT) DESC LIMIT 10"));

        let unsorted = asm
            .build_select(&SelectRequest::new(Level::Series, 1).max_records(10))
            .unwrap();
        assert!(!unsorted.sql.contains("LIMIT"));
        assert!(!unsorted.sql.contains("ORDER BY"));
    }

    #[test]
    fn test_sql_server_cap_without_sort_has_no_top() {
        let query = assembler(Dialect::SqlServer)
            .build_select(&SelectRequest::new(Level::Study, 1).max_records(10))
            .unwrap();
        assert!(!query.sql.contains("TOP"));
    }

    #[test]
    fn test_sort_without_cap() {
        let query = assembler(Dialect::SqlServer)
            .build_select(
                &SelectRequest::new(Level::Study, 1)
                    .sort_by(vec![accession()], QuerySortOrder::None),
            )
            .unwrap();
        assert!(!query.sql.contains("TOP"));
        assert!(query.sql.ends_with("ORDER BY [tag_00080050]"));
    }

    #[test]
    fn test_invalid_filter_tag_propagates() {
        let request = SelectRequest::new(Level::Series, 1)
            .with_filter(QueryFilter::exact(accession(), "A1"));
        assert!(matches!(
            assembler(Dialect::SqlServer).build_count(&request),
            Err(CompileError::InvalidQueryableTag { .. })
        ));
    }
}
