pub mod compiler;
pub mod dialect;
pub mod filter;
pub mod registry;
pub mod sort;
pub mod sql_builder;
pub mod statement;
pub mod tag_codec;

pub use compiler::FilterCompiler;
pub use dialect::Dialect;
pub use filter::{QueryFilter, QueryType};
pub use registry::{QueryableTagRegistry, TagProvider};
pub use sort::{QuerySortOrder, SortCompiler};
pub use sql_builder::{BuiltQuery, CompileError, ParamList, SqlParam, SqlValue};
pub use statement::{ColumnSelection, SelectRequest, StatementAssembler};
pub use tag_codec::{ColumnNaming, TagCodec};
