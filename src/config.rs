//! Configuration for the Parquet reader binding
//!
//! This module centralizes the tunable constants and the `ReaderOptions`
//! passed to every reader.

use derive_builder::Builder;
use std::time::Duration;

// ============================================================================
// I/O Configuration
// ============================================================================

/// Bytes read from the end of a file when loading the Parquet footer
///
/// Set to 64KB so the footer of a typical file arrives in one request.
/// Larger footers cost a second request for the remainder.
pub const FOOTER_PREFETCH_SIZE: usize = 64 * 1024; // 64 KB

/// Number of rows decoded per Arrow record batch
pub const DEFAULT_BATCH_SIZE: usize = 64 * 1024;

// ============================================================================
// Remote Source Configuration
// ============================================================================

/// Default namenode HTTP port serving the WebHDFS REST API (Hadoop 3.x)
pub const DEFAULT_WEBHDFS_PORT: u16 = 9870;

/// Timeout for a single WebHDFS request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Environment overrides
// ============================================================================

pub const ENV_HDFS_USER: &str = "HADOOP_USER_NAME";
pub const ENV_BATCH_SIZE: &str = "PQ_READER_BATCH_SIZE";
pub const ENV_AWS_REGION: &str = "AWS_REGION";

/// Options shared by every reader created through the binding
#[derive(Debug, Clone, Builder)]
pub struct ReaderOptions {
    /// Rows decoded per Arrow batch
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,
    /// Bytes prefetched from the end of the file for the footer
    #[builder(default = "FOOTER_PREFETCH_SIZE")]
    pub footer_prefetch: usize,
    /// Port used for `hdfs://` URIs that do not carry one
    #[builder(default = "DEFAULT_WEBHDFS_PORT")]
    pub webhdfs_port: u16,
    /// Value of the WebHDFS `user.name` parameter (simple auth)
    #[builder(default, setter(into, strip_option))]
    pub hdfs_user: Option<String>,
    #[builder(default = "HTTP_TIMEOUT")]
    pub http_timeout: Duration,
    /// AWS region for `s3://` sources; the SDK default chain is used when unset
    #[builder(default, setter(into, strip_option))]
    pub s3_region: Option<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            footer_prefetch: FOOTER_PREFETCH_SIZE,
            webhdfs_port: DEFAULT_WEBHDFS_PORT,
            hdfs_user: None,
            http_timeout: HTTP_TIMEOUT,
            s3_region: None,
        }
    }
}

impl ReaderOptions {
    /// Default options overlaid with values from the process environment
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values looked up through `lookup`; unset or unparsable values are ignored
    pub(crate) fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(user) = lookup(ENV_HDFS_USER).filter(|u| !u.is_empty()) {
            self.hdfs_user = Some(user);
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => self.batch_size = size,
                _ => tracing::warn!(value = %raw, "ignoring invalid {}", ENV_BATCH_SIZE),
            }
        }
        if let Some(region) = lookup(ENV_AWS_REGION).filter(|r| !r.is_empty()) {
            self.s3_region = Some(region);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builder_defaults() {
        let options = ReaderOptionsBuilder::default().build().unwrap();
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(options.footer_prefetch, FOOTER_PREFETCH_SIZE);
        assert_eq!(options.webhdfs_port, DEFAULT_WEBHDFS_PORT);
        assert!(options.hdfs_user.is_none());
        assert!(options.s3_region.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let options = ReaderOptionsBuilder::default()
            .batch_size(10)
            .hdfs_user("etl")
            .webhdfs_port(50070)
            .build()
            .unwrap();
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.hdfs_user.as_deref(), Some("etl"));
        assert_eq!(options.webhdfs_port, 50070);
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_HDFS_USER, "hdfs"),
            (ENV_BATCH_SIZE, "4096"),
            (ENV_AWS_REGION, "eu-west-1"),
        ]);
        let options =
            ReaderOptions::default().with_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(options.hdfs_user.as_deref(), Some("hdfs"));
        assert_eq!(options.batch_size, 4096);
        assert_eq!(options.s3_region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_env_overlay_ignores_invalid_batch_size() {
        let options = ReaderOptions::default().with_env(|key| {
            (key == ENV_BATCH_SIZE).then(|| "zero".to_string())
        });
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);

        let options =
            ReaderOptions::default().with_env(|key| (key == ENV_BATCH_SIZE).then(|| "0".to_string()));
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }
}
