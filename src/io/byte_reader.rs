use anyhow::Result;
use async_trait::async_trait;

/// Abstraction for byte-level I/O operations
/// This trait enables reading Parquet files from different sources (local, HDFS, S3)
/// with a unified interface for footer and column chunk reads
#[async_trait]
pub trait ByteReader: Send + Sync {
    /// Get the total size of the file/object in bytes
    async fn size(&self) -> Result<u64>;

    /// Read a range of bytes from the file/object
    /// Returns the bytes read (may be less than requested if EOF is reached)
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}
