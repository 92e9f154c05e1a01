//! Parquet support for the reader binding.
//!
//! This module reads Apache Parquet files through the `parquet` crate's async
//! reader and materializes them as column tables. It includes:
//! - Schema mapping between Arrow types and runtime column types
//! - Conversion from Arrow arrays to contiguous typed buffers
//! - Range reader serving the async reader's byte range requests from a ByteReader
//! - GenericParquetReader that implements the TableReader trait

mod adapter;
mod conversion;
mod reader;
mod schema;

#[cfg(test)]
pub(crate) mod footer_fixture;

pub use conversion::ColumnBuilder;
pub use reader::GenericParquetReader;
pub use schema::{ColumnSelection, FieldInfo, TableSchema, column_type_for};
