//! I/O abstraction layer for reading bytes from different sources

pub mod byte_reader;
pub mod hdfs_reader;
pub mod local_reader;
pub mod s3_reader;
pub mod uri;

#[cfg(test)]
pub(crate) mod test_server;

pub use byte_reader::ByteReader;
pub use hdfs_reader::HdfsByteReader;
pub use local_reader::LocalFileByteReader;
pub use s3_reader::S3ByteReader;
pub use uri::SourceUri;
