use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use parquet::errors::ParquetError;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};
use crate::io::{HdfsByteReader, LocalFileByteReader, S3ByteReader, SourceUri};
use crate::parquet::{ColumnSelection, GenericParquetReader, TableSchema};
use crate::table::ColumnTable;

/// Information about a row group cached from Parquet metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroupInfo {
    pub index: usize,
    /// Position of the group's first row within the file
    pub first_row: u64,
    pub num_rows: u64,
    pub total_byte_size: u64,
}

/// Metadata about an opened file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_size_bytes: u64,
    pub num_rows: u64,
    pub row_groups: Vec<RowGroupInfo>,
}

/// A run of consecutive row groups read as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub partition_id: u32,
    pub row_groups: Range<usize>,
    pub num_rows: u64,
    pub byte_size: u64,
}

impl FileMetadata {
    /// Build metadata from the footer's `(num_rows, total_byte_size)` per row group
    ///
    /// Row counts size every read buffer, so a negative count or a total that
    /// does not fit the footer's `i64` row count is rejected. Byte sizes only
    /// guide partitioning and are clamped at zero.
    pub fn from_row_groups(
        file_size_bytes: u64,
        groups: impl IntoIterator<Item = (i64, i64)>,
    ) -> parquet::errors::Result<Self> {
        let mut first_row = 0u64;
        let mut row_groups = Vec::new();

        for (index, (num_rows, total_byte_size)) in groups.into_iter().enumerate() {
            let num_rows = u64::try_from(num_rows).map_err(|_| {
                ParquetError::General(format!(
                    "row group {} declares {} rows",
                    index, num_rows
                ))
            })?;
            let next_row = first_row
                .checked_add(num_rows)
                .filter(|&total| total <= i64::MAX as u64)
                .ok_or_else(|| {
                    ParquetError::General(format!(
                        "row group {} with {} rows overflows the file row count",
                        index, num_rows
                    ))
                })?;

            row_groups.push(RowGroupInfo {
                index,
                first_row,
                num_rows,
                total_byte_size: total_byte_size.max(0) as u64,
            });
            first_row = next_row;
        }

        Ok(Self {
            file_size_bytes,
            num_rows: first_row,
            row_groups,
        })
    }

    /// Row groups overlapping rows `[start, end)` and the number of rows to
    /// skip in the first of them
    pub fn row_groups_for_range(&self, start: u64, end: u64) -> (Vec<usize>, u64) {
        if start >= end {
            return (Vec::new(), 0);
        }

        let groups: Vec<&RowGroupInfo> = self
            .row_groups
            .iter()
            .filter(|rg| rg.num_rows > 0 && rg.first_row < end && rg.first_row + rg.num_rows > start)
            .collect();

        let skip = groups.first().map_or(0, |rg| start - rg.first_row);
        (groups.iter().map(|rg| rg.index).collect(), skip)
    }

    /// Group consecutive row groups into partitions of roughly `target_size` bytes
    ///
    /// A row group is never split, so a partition may exceed the target when a
    /// single row group does.
    pub fn create_partitions(&self, target_size: u64) -> Vec<Partition> {
        let mut partitions = Vec::new();
        let mut partition_id = 0u32;

        let mut current_start: Option<usize> = None;
        let mut current_size = 0u64;
        let mut current_rows = 0u64;

        for rg in &self.row_groups {
            // Check if adding this row group would exceed target
            if let Some(start) = current_start
                && current_size.saturating_add(rg.total_byte_size) > target_size
            {
                partitions.push(Partition {
                    partition_id,
                    row_groups: start..rg.index,
                    num_rows: current_rows,
                    byte_size: current_size,
                });

                partition_id += 1;
                current_start = None;
                current_size = 0;
                current_rows = 0;
            }

            current_start.get_or_insert(rg.index);
            current_size = current_size.saturating_add(rg.total_byte_size);
            current_rows += rg.num_rows;
        }

        // Add final partition if any row groups remain
        if let Some(start) = current_start {
            partitions.push(Partition {
                partition_id,
                row_groups: start..self.row_groups.len(),
                num_rows: current_rows,
                byte_size: current_size,
            });
        }

        partitions
    }
}

/// Trait for materializing Parquet data into column tables
#[async_trait]
pub trait TableReader: Send + Sync {
    /// The source this reader was opened on
    fn uri(&self) -> &str;

    fn schema(&self) -> &TableSchema;

    fn metadata(&self) -> &FileMetadata;

    /// Create partitions for the file, respecting row group boundaries
    fn create_partitions(&self, target_size: u64) -> Vec<Partition> {
        self.metadata().create_partitions(target_size)
    }

    /// Read every row of the selected columns
    async fn read_table(&self, selection: &ColumnSelection) -> Result<ColumnTable>;

    /// Read rows `[start, start + count)` of the selected columns
    async fn read_rows(
        &self,
        selection: &ColumnSelection,
        start: u64,
        count: u64,
    ) -> Result<ColumnTable>;

    /// Read the row groups of one partition
    async fn read_partition(
        &self,
        selection: &ColumnSelection,
        partition: &Partition,
    ) -> Result<ColumnTable>;
}

/// Factory for creating TableReader instances based on the source URI
pub struct ReaderFactory {
    options: ReaderOptions,
    s3_client: OnceCell<Arc<S3Client>>,
}

impl ReaderFactory {
    /// Create a new ReaderFactory
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            s3_client: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// S3 client built from the default AWS configuration chain on first use
    async fn s3_client(&self) -> Arc<S3Client> {
        let client = self
            .s3_client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(ref region) = self.options.s3_region {
                    loader = loader.region(Region::new(region.clone()));
                }
                let aws_config = loader.load().await;
                Arc::new(S3Client::new(&aws_config))
            })
            .await;
        Arc::clone(client)
    }

    /// Open a TableReader for the source URI, reading the file footer
    pub async fn create_reader(&self, source_uri: &SourceUri) -> Result<Arc<dyn TableReader>> {
        let uri = source_uri.to_string();
        let options = self.options.clone();

        match source_uri {
            SourceUri::Local(path) => {
                let byte_reader = LocalFileByteReader::new(path);
                let reader = GenericParquetReader::new(uri, byte_reader, options).await?;
                Ok(Arc::new(reader) as Arc<dyn TableReader>)
            }

            SourceUri::Hdfs { host, path, .. } | SourceUri::WebHdfs { host, path, .. } => {
                let byte_reader = HdfsByteReader::new(
                    host,
                    source_uri.webhdfs_port(options.webhdfs_port),
                    path,
                    options.hdfs_user.clone(),
                    options.http_timeout,
                )
                .map_err(|e| ReaderError::InvalidUri(format!("{:#}", e)))?;
                let reader = GenericParquetReader::new(uri, byte_reader, options).await?;
                Ok(Arc::new(reader) as Arc<dyn TableReader>)
            }

            SourceUri::S3 { bucket, key } => {
                let byte_reader =
                    S3ByteReader::new(self.s3_client().await, bucket.clone(), key.clone());
                let reader = GenericParquetReader::new(uri, byte_reader, options).await?;
                Ok(Arc::new(reader) as Arc<dyn TableReader>)
            }
        }
    }
}
