//! Schema difference model.
//!
//! A [`SchemaDiff`] is filled by a schema comparison pass and read by
//! migration tooling, which turns its [`ColumnDetails`] into DDL.

pub mod diff;

pub use diff::{ColumnDetails, SchemaDiff};
