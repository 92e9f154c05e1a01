//! Error types for the reader binding.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use std::io;

pub type Result<T, E = ReaderError> = std::result::Result<T, E>;

/// Errors surfaced to callers of the binding.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The source file or object does not exist
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The requested columns or types do not match the file schema
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The Parquet footer or column data could not be decoded
    #[error("corrupt parquet file '{uri}': {source}")]
    CorruptFile {
        uri: String,
        #[source]
        source: ParquetError,
    },

    /// The source URI could not be parsed or uses an unsupported scheme
    #[error("invalid source URI: {0}")]
    InvalidUri(String),

    /// A row range outside the file was requested
    #[error("row range {start}..{end} out of bounds for {num_rows} rows")]
    InvalidRange { start: u64, end: u64, num_rows: u64 },

    /// A partition refers to row groups the file does not have
    #[error("partition {partition_id} covers row groups {start}..{end}, file has {num_row_groups}")]
    InvalidPartition {
        partition_id: u32,
        start: usize,
        end: usize,
        num_row_groups: usize,
    },

    /// A caller passed a null pointer or an out-of-domain value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An Arrow array could not be converted to the runtime layout
    #[error("failed to convert column '{column}': {source}")]
    Conversion {
        column: String,
        #[source]
        source: ArrowError,
    },

    /// Transport failure while reading from the source
    #[error("I/O error reading '{uri}': {source}")]
    Io {
        uri: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ReaderError {
    /// Classify a failure that happened while opening a source
    pub(crate) fn from_open(uri: &str, err: anyhow::Error) -> Self {
        let not_found = err.chain().any(|cause| {
            cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
        });
        if not_found {
            ReaderError::FileNotFound(uri.to_string())
        } else {
            ReaderError::Io {
                uri: uri.to_string(),
                source: err.into(),
            }
        }
    }

    /// Classify an error reported by the parquet crate
    ///
    /// Transport errors bubble up through the adapter as `External`; anything
    /// else means the bytes themselves could not be decoded.
    pub(crate) fn from_parquet(uri: &str, err: ParquetError) -> Self {
        match err {
            ParquetError::External(source) => ReaderError::Io {
                uri: uri.to_string(),
                source,
            },
            other => ReaderError::CorruptFile {
                uri: uri.to_string(),
                source: other,
            },
        }
    }

    /// Stable code exported through the C ABI
    pub fn code(&self) -> i32 {
        match self {
            ReaderError::FileNotFound(_) => -1,
            ReaderError::SchemaMismatch(_) => -2,
            ReaderError::CorruptFile { .. } => -3,
            ReaderError::InvalidUri(_) => -4,
            ReaderError::InvalidRange { .. } => -5,
            ReaderError::Conversion { .. } => -6,
            ReaderError::Io { .. } => -7,
            ReaderError::InvalidPartition { .. } => -8,
            ReaderError::InvalidArgument(_) => -9,
        }
    }
}
