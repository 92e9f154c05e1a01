// Public API
pub mod binding;
pub mod blocking;
pub mod config;
pub mod error;
pub mod ffi;
pub mod io;
pub mod parquet;
pub mod reader;
pub mod table;

// Internal modules
mod telemetry;


pub use binding::{block_range, open, read_parquet};
pub use blocking::BlockingReader;
pub use config::ReaderOptions;
pub use error::{ReaderError, Result};
pub use reader::{FileMetadata, Partition, ReaderFactory, RowGroupInfo, TableReader};
pub use table::{Column, ColumnData, ColumnTable, ColumnType, Validity};
