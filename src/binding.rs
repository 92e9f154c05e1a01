//! High-level API for reading Parquet files into column tables.
//!
//! This module wraps URI parsing, reader construction and column selection
//! behind a couple of calls. It is the entry point used by the CLI, the
//! blocking facade and the C ABI.

use std::sync::Arc;
use tracing::debug;

use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};
use crate::io::SourceUri;
use crate::parquet::ColumnSelection;
use crate::reader::{ReaderFactory, TableReader};
use crate::table::ColumnTable;

/// Open a Parquet file and read its footer
///
/// `uri` may be a local path, a `file://` URI, `hdfs://host[:port]/path`,
/// `webhdfs://host[:port]/path` or `s3://bucket/key`.
pub async fn open(uri: &str, options: ReaderOptions) -> Result<Arc<dyn TableReader>> {
    let source_uri =
        SourceUri::parse(uri).map_err(|e| ReaderError::InvalidUri(format!("{:#}", e)))?;
    debug!(uri = %source_uri, "opening source");

    let factory = ReaderFactory::new(options);
    factory.create_reader(&source_uri).await
}

/// Read the selected columns of a Parquet file into a column table
///
/// # Example
///
/// ```no_run
/// use pq_reader::binding::read_parquet;
/// use pq_reader::config::ReaderOptions;
/// use pq_reader::parquet::ColumnSelection;
///
/// # async fn example() -> pq_reader::error::Result<()> {
/// let table = read_parquet(
///     "hdfs://namenode:9870/warehouse/trips.parquet",
///     &ColumnSelection::names(["fare", "distance"]),
///     ReaderOptions::from_env(),
/// )
/// .await?;
/// println!("Read {} rows", table.num_rows());
/// # Ok(())
/// # }
/// ```
pub async fn read_parquet(
    uri: &str,
    selection: &ColumnSelection,
    options: ReaderOptions,
) -> Result<ColumnTable> {
    let reader = open(uri, options).await?;
    reader.read_table(selection).await
}

/// Contiguous slice of `total` rows assigned to reader `index` of `parts`
///
/// Returns `(start, count)`. The first `total % parts` readers get one extra
/// row, so concatenating the slices of readers `0..parts` covers `[0, total)`
/// exactly once. `parts == 0` or `index >= parts` yield an empty slice.
///
/// ```
/// use pq_reader::binding::block_range;
///
/// assert_eq!(block_range(10, 3, 0), (0, 4));
/// assert_eq!(block_range(10, 3, 1), (4, 3));
/// assert_eq!(block_range(10, 3, 2), (7, 3));
/// ```
pub fn block_range(total: u64, parts: u64, index: u64) -> (u64, u64) {
    if parts == 0 || index >= parts {
        return (total, 0);
    }

    let base = total / parts;
    let extra = total % parts;
    let start = index * base + index.min(extra);
    let count = base + u64::from(index < extra);
    (start, count)
}
