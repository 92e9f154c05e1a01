//! `AsyncFileReader` implementation over a `ByteReader`.
//!
//! The async Parquet reader asks for the exact byte ranges it needs: the
//! footer first, then one range per projected column chunk. Each range maps
//! onto a single `read_range` call, so WebHDFS and S3 sources see one request
//! per column chunk, and chunks of one row group are fetched concurrently.

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use parquet::arrow::arrow_reader::ArrowReaderOptions;
use parquet::arrow::async_reader::AsyncFileReader;
use parquet::errors::{ParquetError, Result};
use parquet::file::metadata::{ParquetMetaData, ParquetMetaDataReader};
use std::ops::Range;
use std::sync::Arc;

use crate::io::ByteReader;

/// Serves the Parquet reader's range requests from a `ByteReader`
pub struct ByteRangeReader<R: ByteReader> {
    reader: Arc<R>,
    file_size: u64,
    /// Bytes fetched from the end of the file when loading the footer
    footer_prefetch: usize,
}

impl<R: ByteReader + 'static> ByteRangeReader<R> {
    pub fn new(reader: Arc<R>, file_size: u64, footer_prefetch: usize) -> Self {
        Self {
            reader,
            file_size,
            footer_prefetch,
        }
    }
}

/// Fetch exactly `range`; a source that returns fewer bytes is truncated
async fn fetch_range<R: ByteReader>(
    reader: Arc<R>,
    file_size: u64,
    range: Range<u64>,
) -> Result<Bytes> {
    if range.start > range.end || range.end > file_size {
        return Err(ParquetError::EOF(format!(
            "requested bytes {}..{} of a {} byte file",
            range.start, range.end, file_size
        )));
    }

    let data = reader
        .read_range(range.start, range.end)
        .await
        .map_err(|e| ParquetError::External(e.into()))?;

    let expected = range.end - range.start;
    if data.len() as u64 != expected {
        return Err(ParquetError::EOF(format!(
            "source returned {} of {} bytes at offset {}",
            data.len(),
            expected,
            range.start
        )));
    }
    Ok(Bytes::from(data))
}

impl<R: ByteReader + 'static> AsyncFileReader for ByteRangeReader<R> {
    fn get_bytes(&mut self, range: Range<u64>) -> BoxFuture<'_, Result<Bytes>> {
        fetch_range(Arc::clone(&self.reader), self.file_size, range).boxed()
    }

    fn get_byte_ranges(&mut self, ranges: Vec<Range<u64>>) -> BoxFuture<'_, Result<Vec<Bytes>>> {
        let fetches: Vec<_> = ranges
            .into_iter()
            .map(|range| fetch_range(Arc::clone(&self.reader), self.file_size, range))
            .collect();
        try_join_all(fetches).boxed()
    }

    fn get_metadata(
        &mut self,
        _options: Option<&'_ ArrowReaderOptions>,
    ) -> BoxFuture<'_, Result<Arc<ParquetMetaData>>> {
        async move {
            let file_size = self.file_size;
            let metadata = ParquetMetaDataReader::new()
                .with_prefetch_hint(Some(self.footer_prefetch))
                .load_and_finish(self, file_size)
                .await?;
            Ok(Arc::new(metadata))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use async_trait::async_trait;
    use parquet::arrow::ArrowWriter;
    use std::sync::Mutex;

    /// In-memory ByteReader that records every requested range
    struct RecordingByteReader {
        data: Vec<u8>,
        /// Bytes actually served, may be less than `data.len()`
        served: usize,
        requests: Mutex<Vec<(u64, u64)>>,
    }

    impl RecordingByteReader {
        fn new(data: Vec<u8>) -> Self {
            let served = data.len();
            Self {
                data,
                served,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(u64, u64)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ByteReader for RecordingByteReader {
        async fn size(&self) -> anyhow::Result<u64> {
            Ok(self.data.len() as u64)
        }

        async fn read_range(&self, start: u64, end: u64) -> anyhow::Result<Vec<u8>> {
            self.requests.lock().unwrap().push((start, end));
            let start = (start as usize).min(self.served);
            let end = (end as usize).min(self.served);
            Ok(self.data[start..end].to_vec())
        }
    }

    fn parquet_bytes(num_rows: i32) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(Int32Array::from_iter_values(0..num_rows))],
        )
        .unwrap();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        buf
    }

    #[tokio::test]
    async fn test_get_bytes_is_one_request() {
        let reader = Arc::new(RecordingByteReader::new(b"0123456789ABCDEFGHIJ".to_vec()));
        let mut range_reader = ByteRangeReader::new(Arc::clone(&reader), 20, 1024);

        let bytes = range_reader.get_bytes(10..15).await.unwrap();
        assert_eq!(&bytes[..], b"ABCDE");
        assert_eq!(reader.requests(), vec![(10, 15)]);
    }

    #[tokio::test]
    async fn test_get_byte_ranges_keeps_order() {
        let reader = Arc::new(RecordingByteReader::new(b"0123456789ABCDEFGHIJ".to_vec()));
        let mut range_reader = ByteRangeReader::new(Arc::clone(&reader), 20, 1024);

        let chunks = range_reader
            .get_byte_ranges(vec![15..20, 0..3, 3..3])
            .await
            .unwrap();
        assert_eq!(&chunks[0][..], b"FGHIJ");
        assert_eq!(&chunks[1][..], b"012");
        assert!(chunks[2].is_empty());
        assert_eq!(reader.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_range_past_end_is_eof() {
        let reader = Arc::new(RecordingByteReader::new(b"short".to_vec()));
        let mut range_reader = ByteRangeReader::new(Arc::clone(&reader), 5, 1024);

        let err = range_reader.get_bytes(2..9).await.unwrap_err();
        assert!(matches!(err, ParquetError::EOF(_)));
        assert!(reader.requests().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_source_is_eof() {
        // Claimed size is larger than the data actually served
        let mut source = RecordingByteReader::new(b"0123456789".to_vec());
        source.served = 4;
        let mut range_reader = ByteRangeReader::new(Arc::new(source), 10, 1024);

        let err = range_reader.get_bytes(2..8).await.unwrap_err();
        assert!(matches!(err, ParquetError::EOF(ref m) if m.contains("2 of 6")));
    }

    #[tokio::test]
    async fn test_source_error_is_external() {
        struct FailingByteReader;

        #[async_trait]
        impl ByteReader for FailingByteReader {
            async fn size(&self) -> anyhow::Result<u64> {
                Ok(100)
            }

            async fn read_range(&self, _start: u64, _end: u64) -> anyhow::Result<Vec<u8>> {
                Err(anyhow::anyhow!("connection reset"))
            }
        }

        let mut range_reader = ByteRangeReader::new(Arc::new(FailingByteReader), 100, 1024);
        let err = range_reader.get_bytes(0..10).await.unwrap_err();
        assert!(matches!(err, ParquetError::External(_)));
    }

    #[tokio::test]
    async fn test_metadata_from_single_tail_fetch() {
        let data = parquet_bytes(50);
        let file_size = data.len() as u64;
        let reader = Arc::new(RecordingByteReader::new(data));
        let mut range_reader = ByteRangeReader::new(Arc::clone(&reader), file_size, 64 * 1024);

        let metadata = range_reader.get_metadata(None).await.unwrap();
        assert_eq!(metadata.file_metadata().num_rows(), 50);

        // Whole file is smaller than the prefetch, so the footer comes in one request
        assert_eq!(reader.requests(), vec![(0, file_size)]);
    }

    #[tokio::test]
    async fn test_metadata_with_minimal_prefetch() {
        let data = parquet_bytes(50);
        let file_size = data.len() as u64;
        let reader = Arc::new(RecordingByteReader::new(data));
        let mut range_reader = ByteRangeReader::new(Arc::clone(&reader), file_size, 0);

        let metadata = range_reader.get_metadata(None).await.unwrap();
        assert_eq!(metadata.num_row_groups(), 1);

        // Footer length first, then the metadata it points at
        let requests = reader.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], (file_size - 8, file_size));
    }
}
