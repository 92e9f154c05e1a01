//! Parquet file reader implementation.

use async_trait::async_trait;
use futures::StreamExt;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ArrowReaderMetadata, ArrowReaderOptions};
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use parquet::errors::ParquetError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};
use crate::io::ByteReader;
use crate::reader::{FileMetadata, Partition, TableReader};
use crate::table::ColumnTable;
use crate::telemetry::ReadStats;

use super::adapter::ByteRangeReader;
use super::conversion::ColumnBuilder;
use super::schema::{ColumnSelection, TableSchema};

/// Leading magic plus the trailing footer length and magic
const MIN_PARQUET_FILE_SIZE: u64 = 12;

/// Parquet file reader that works with any ByteReader implementation
pub struct GenericParquetReader<R: ByteReader> {
    uri: String,
    reader: Arc<R>,
    options: ReaderOptions,
    arrow_metadata: ArrowReaderMetadata,
    schema: TableSchema,
    metadata: FileMetadata,
}

impl<R: ByteReader + 'static> GenericParquetReader<R> {
    /// Create a new ParquetReader by reading the file metadata
    pub async fn new(uri: impl Into<String>, reader: R, options: ReaderOptions) -> Result<Self> {
        let uri = uri.into();
        let reader = Arc::new(reader);

        let file_size = reader
            .size()
            .await
            .map_err(|e| ReaderError::from_open(&uri, e))?;

        if file_size < MIN_PARQUET_FILE_SIZE {
            return Err(ReaderError::CorruptFile {
                uri,
                source: ParquetError::General(format!(
                    "file of {} bytes is too small to be a Parquet file",
                    file_size
                )),
            });
        }

        // Read Parquet metadata from footer
        let mut range_reader =
            ByteRangeReader::new(Arc::clone(&reader), file_size, options.footer_prefetch);
        let arrow_metadata =
            ArrowReaderMetadata::load_async(&mut range_reader, ArrowReaderOptions::new())
                .await
                .map_err(|e| ReaderError::from_parquet(&uri, e))?;

        // Extract row group information, rejecting counts no real file can have
        let metadata = match FileMetadata::from_row_groups(
            file_size,
            arrow_metadata
                .metadata()
                .row_groups()
                .iter()
                .map(|rg| (rg.num_rows(), rg.total_byte_size())),
        ) {
            Ok(metadata) => metadata,
            Err(source) => return Err(ReaderError::CorruptFile { uri, source }),
        };
        let schema = TableSchema::from_arrow(arrow_metadata.schema());

        info!(
            uri = %uri,
            rows = metadata.num_rows,
            row_groups = metadata.row_groups.len(),
            columns = schema.len(),
            "opened parquet file"
        );

        Ok(Self {
            uri,
            reader,
            options,
            arrow_metadata,
            schema,
            metadata,
        })
    }

    /// Read the selected root columns from `row_groups`, skipping `offset`
    /// rows and stopping after `limit` rows
    async fn read_selected(
        &self,
        indices: &[usize],
        row_groups: Vec<usize>,
        offset: usize,
        limit: Option<usize>,
        expected_rows: u64,
    ) -> Result<ColumnTable> {
        let mut builders = indices
            .iter()
            .map(|&index| {
                let field = self.schema.field(index).ok_or_else(|| {
                    ReaderError::SchemaMismatch(format!("column index {} out of range", index))
                })?;
                let column_type = field.column_type.ok_or_else(|| {
                    ReaderError::SchemaMismatch(format!(
                        "column '{}' has unsupported type {}",
                        field.name, field.data_type
                    ))
                })?;
                // Footer counts are untrusted, so reserve at most one batch up front
                let capacity = expected_rows.min(self.options.batch_size as u64) as usize;
                Ok(ColumnBuilder::new(field.name.clone(), column_type, capacity))
            })
            .collect::<Result<Vec<_>>>()?;

        if indices.is_empty() || row_groups.is_empty() {
            return ColumnTable::try_new(
                builders
                    .into_iter()
                    .map(ColumnBuilder::finish)
                    .collect::<Result<_>>()?,
            );
        }

        // Projected batches carry columns in file order, not request order
        let slots = sorted_slots(indices);
        let file_order: Vec<usize> = slots.iter().map(|&slot| indices[slot]).collect();
        let mut batch_positions = vec![0; indices.len()];
        for (position, &slot) in slots.iter().enumerate() {
            batch_positions[slot] = position;
        }

        let range_reader = ByteRangeReader::new(
            Arc::clone(&self.reader),
            self.metadata.file_size_bytes,
            self.options.footer_prefetch,
        );
        let mask = ProjectionMask::roots(self.arrow_metadata.parquet_schema(), file_order);

        let mut builder =
            ParquetRecordBatchStreamBuilder::new_with_metadata(range_reader, self.arrow_metadata.clone())
                .with_projection(mask)
                .with_row_groups(row_groups)
                .with_batch_size(self.options.batch_size);
        if offset > 0 {
            builder = builder.with_offset(offset);
        }
        if let Some(limit) = limit {
            builder = builder.with_limit(limit);
        }

        let mut stream = builder
            .build()
            .map_err(|e| ReaderError::from_parquet(&self.uri, e))?;

        let mut stats = ReadStats::new();
        let mut waited = Instant::now();
        while let Some(batch_result) = stream.next().await {
            let batch = batch_result.map_err(|e| ReaderError::from_parquet(&self.uri, e))?;
            let decode_time = waited.elapsed();

            for (builder, &position) in builders.iter_mut().zip(&batch_positions) {
                builder.append(batch.column(position).as_ref())?;
            }

            stats.record_batch(batch.num_rows(), estimate_batch_size(&batch), decode_time);
            waited = Instant::now();
        }

        // Callers size their buffers from the footer counts
        if stats.rows != expected_rows {
            return Err(ReaderError::CorruptFile {
                uri: self.uri.clone(),
                source: ParquetError::General(format!(
                    "decoded {} rows where the footer declares {}",
                    stats.rows, expected_rows
                )),
            });
        }

        let (p50, _, p99) = stats.get_percentiles();
        debug!(
            uri = %self.uri,
            columns = indices.len(),
            batches = stats.batches,
            rows = stats.rows,
            bytes_decoded = stats.bytes_decoded,
            p50_us = ?p50,
            p99_us = ?p99,
            "materialized columns"
        );

        let columns = builders
            .into_iter()
            .map(ColumnBuilder::finish)
            .collect::<Result<_>>()?;
        ColumnTable::try_new(columns)
    }
}

#[async_trait]
impl<R: ByteReader + 'static> TableReader for GenericParquetReader<R> {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    async fn read_table(&self, selection: &ColumnSelection) -> Result<ColumnTable> {
        let indices = self.schema.resolve(selection)?;
        let row_groups = (0..self.metadata.row_groups.len()).collect();
        self.read_selected(&indices, row_groups, 0, None, self.metadata.num_rows)
            .await
    }

    async fn read_rows(
        &self,
        selection: &ColumnSelection,
        start: u64,
        count: u64,
    ) -> Result<ColumnTable> {
        let num_rows = self.metadata.num_rows;
        let end = start
            .checked_add(count)
            .filter(|&end| end <= num_rows)
            .ok_or(ReaderError::InvalidRange {
                start,
                end: start.saturating_add(count),
                num_rows,
            })?;

        let indices = self.schema.resolve(selection)?;
        let (row_groups, skip) = self.metadata.row_groups_for_range(start, end);
        self.read_selected(
            &indices,
            row_groups,
            skip as usize,
            Some(count as usize),
            count,
        )
        .await
    }

    async fn read_partition(
        &self,
        selection: &ColumnSelection,
        partition: &Partition,
    ) -> Result<ColumnTable> {
        let num_row_groups = self.metadata.row_groups.len();
        if partition.row_groups.is_empty() || partition.row_groups.end > num_row_groups {
            return Err(ReaderError::InvalidPartition {
                partition_id: partition.partition_id,
                start: partition.row_groups.start,
                end: partition.row_groups.end,
                num_row_groups,
            });
        }

        let indices = self.schema.resolve(selection)?;
        let expected_rows = self.metadata.row_groups[partition.row_groups.clone()]
            .iter()
            .map(|rg| rg.num_rows)
            .sum();
        self.read_selected(
            &indices,
            partition.row_groups.clone().collect(),
            0,
            None,
            expected_rows,
        )
        .await
    }
}

/// Positions of `indices` in ascending order of the index they hold
///
/// Projected batches carry columns in file order, so the i-th batch column
/// belongs to request slot `sorted_slots(indices)[i]`.
fn sorted_slots(indices: &[usize]) -> Vec<usize> {
    let mut slots: Vec<usize> = (0..indices.len()).collect();
    slots.sort_unstable_by_key(|&slot| indices[slot]);
    slots
}

/// Estimate byte size of a RecordBatch (approximation)
fn estimate_batch_size(batch: &arrow::record_batch::RecordBatch) -> u64 {
    // Sum byte sizes of all arrays
    let mut size = 0u64;
    for column in batch.columns() {
        size += column.get_array_memory_size() as u64;
    }
    size
}
