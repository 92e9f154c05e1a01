//! Synchronous facade over the async readers.
//!
//! Embedders that make one call at a time (the C ABI, scripts driving the
//! runtime) hold a `BlockingReader`, which owns its own current-thread tokio
//! runtime alongside the opened reader.

use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

use crate::binding;
use crate::config::ReaderOptions;
use crate::error::{ReaderError, Result};
use crate::parquet::{ColumnSelection, TableSchema};
use crate::reader::{FileMetadata, Partition, TableReader};
use crate::table::ColumnTable;

/// An opened Parquet file whose reads block the calling thread
pub struct BlockingReader {
    runtime: Runtime,
    reader: Arc<dyn TableReader>,
}

impl BlockingReader {
    /// Open `uri` and read its footer
    pub fn open(uri: &str, options: ReaderOptions) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ReaderError::Io {
                uri: uri.to_string(),
                source: Box::new(e),
            })?;
        let reader = runtime.block_on(binding::open(uri, options))?;
        Ok(Self { runtime, reader })
    }

    pub fn uri(&self) -> &str {
        self.reader.uri()
    }

    pub fn schema(&self) -> &TableSchema {
        self.reader.schema()
    }

    pub fn metadata(&self) -> &FileMetadata {
        self.reader.metadata()
    }

    pub fn num_rows(&self) -> u64 {
        self.reader.metadata().num_rows
    }

    pub fn create_partitions(&self, target_size: u64) -> Vec<Partition> {
        self.reader.create_partitions(target_size)
    }

    pub fn read_table(&self, selection: &ColumnSelection) -> Result<ColumnTable> {
        self.runtime.block_on(self.reader.read_table(selection))
    }

    pub fn read_rows(
        &self,
        selection: &ColumnSelection,
        start: u64,
        count: u64,
    ) -> Result<ColumnTable> {
        self.runtime
            .block_on(self.reader.read_rows(selection, start, count))
    }

    pub fn read_partition(
        &self,
        selection: &ColumnSelection,
        partition: &Partition,
    ) -> Result<ColumnTable> {
        self.runtime
            .block_on(self.reader.read_partition(selection, partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::NamedTempFile;

    fn write_fixture() -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(Int64Array::from_iter_values(0..30))],
        )
        .unwrap();

        let file = std::fs::File::create(temp_file.path()).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        temp_file
    }

    #[test]
    fn test_blocking_reads() {
        let temp_file = write_fixture();
        let path = temp_file.path().to_str().unwrap();
        let reader = BlockingReader::open(path, ReaderOptions::default()).unwrap();

        assert_eq!(reader.num_rows(), 30);
        assert_eq!(reader.schema().len(), 1);

        let table = reader
            .read_rows(&ColumnSelection::All, 10, 5)
            .unwrap();
        match table.column(0).unwrap().data() {
            ColumnData::Int64(values) => assert_eq!(values, &vec![10, 11, 12, 13, 14]),
            other => panic!("unexpected data {:?}", other),
        }

        let partitions = reader.create_partitions(u64::MAX);
        assert_eq!(partitions.len(), 1);
        let table = reader
            .read_partition(&ColumnSelection::All, &partitions[0])
            .unwrap();
        assert_eq!(table.num_rows(), 30);
    }

    #[test]
    fn test_blocking_open_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nope.parquet");
        let result = BlockingReader::open(path.to_str().unwrap(), ReaderOptions::default());
        assert!(matches!(result, Err(ReaderError::FileNotFound(_))));
    }
}
