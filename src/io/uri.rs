use anyhow::{Result, anyhow};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Represents a parsed source URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUri {
    Local(PathBuf),
    /// `hdfs://` file, read through the namenode's WebHDFS gateway
    ///
    /// `port` is the namenode RPC port written in the URI. It is kept for
    /// display only; requests go to the configured WebHDFS port.
    Hdfs {
        host: String,
        port: Option<u16>,
        path: String,
    },
    /// `webhdfs://` file; `port` is the HTTP port of the gateway
    WebHdfs {
        host: String,
        port: Option<u16>,
        path: String,
    },
    S3 {
        bucket: String,
        key: String,
    },
}

impl SourceUri {
    /// Parse a URI string into a SourceUri
    pub fn parse(uri: &str) -> Result<Self> {
        // Try parsing as URL first
        if let Ok(url) = Url::parse(uri) {
            match url.scheme() {
                "hdfs" | "webhdfs" => {
                    let host = url
                        .host_str()
                        .filter(|h| !h.is_empty())
                        .ok_or_else(|| anyhow!("HDFS URI missing namenode host: {}", uri))?
                        .to_string();

                    let path = url.path().to_string();
                    if path.trim_start_matches('/').is_empty() {
                        return Err(anyhow!("HDFS URI missing path: {}", uri));
                    }

                    let port = url.port();
                    if url.scheme() == "webhdfs" {
                        Ok(SourceUri::WebHdfs { host, port, path })
                    } else {
                        Ok(SourceUri::Hdfs { host, port, path })
                    }
                }
                "s3" => {
                    let bucket = url
                        .host_str()
                        .ok_or_else(|| anyhow!("S3 URI missing bucket: {}", uri))?
                        .to_string();

                    // Remove leading '/' from path
                    let key = url.path().trim_start_matches('/').to_string();

                    if key.is_empty() {
                        return Err(anyhow!("S3 URI missing key: {}", uri));
                    }

                    Ok(SourceUri::S3 { bucket, key })
                }
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow!("Invalid file:// URI: {}", uri))?;
                    Ok(SourceUri::Local(path))
                }
                // Windows drive letters parse as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(SourceUri::Local(PathBuf::from(uri))),
                scheme => Err(anyhow!("Unsupported URI scheme: {}", scheme)),
            }
        } else {
            // Treat as local file path
            Ok(SourceUri::Local(PathBuf::from(uri)))
        }
    }
}

impl SourceUri {
    /// HTTP port of the WebHDFS gateway serving this URI
    ///
    /// Only `webhdfs://` URIs carry one; every other source uses `default_port`.
    pub fn webhdfs_port(&self, default_port: u16) -> u16 {
        match self {
            SourceUri::WebHdfs {
                port: Some(port), ..
            } => *port,
            _ => default_port,
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUri::Local(path) => write!(f, "{}", path.display()),
            SourceUri::Hdfs {
                host,
                port: Some(port),
                path,
            } => write!(f, "hdfs://{}:{}{}", host, port, path),
            SourceUri::Hdfs {
                host,
                port: None,
                path,
            } => write!(f, "hdfs://{}{}", host, path),
            SourceUri::WebHdfs {
                host,
                port: Some(port),
                path,
            } => write!(f, "webhdfs://{}:{}{}", host, port, path),
            SourceUri::WebHdfs {
                host,
                port: None,
                path,
            } => write!(f, "webhdfs://{}{}", host, path),
            SourceUri::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hdfs_uri() {
        let uri = SourceUri::parse("hdfs://namenode:9870/data/part-0.parquet").unwrap();
        assert_eq!(
            uri,
            SourceUri::Hdfs {
                host: "namenode".to_string(),
                port: Some(9870),
                path: "/data/part-0.parquet".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_hdfs_uri_without_port() {
        let uri = SourceUri::parse("hdfs://namenode/data/file.parquet").unwrap();
        match uri {
            SourceUri::Hdfs { host, port, path } => {
                assert_eq!(host, "namenode");
                assert_eq!(port, None);
                assert_eq!(path, "/data/file.parquet");
            }
            _ => panic!("Expected HDFS URI"),
        }
    }

    #[test]
    fn test_parse_webhdfs_uri() {
        let uri = SourceUri::parse("webhdfs://nn.example.com:50070/a.parquet").unwrap();
        assert!(matches!(uri, SourceUri::WebHdfs { port: Some(50070), .. }));
    }

    #[test]
    fn test_hdfs_rpc_port_is_not_used_for_http() {
        // 8020 is the namenode RPC port, WebHDFS requests go to the configured port
        let uri = SourceUri::parse("hdfs://nn:8020/x.parquet").unwrap();
        assert_eq!(uri.webhdfs_port(9870), 9870);

        let uri = SourceUri::parse("hdfs://nn/x.parquet").unwrap();
        assert_eq!(uri.webhdfs_port(9870), 9870);
    }

    #[test]
    fn test_webhdfs_port_is_http_port() {
        let uri = SourceUri::parse("webhdfs://nn:50070/x.parquet").unwrap();
        assert_eq!(uri.webhdfs_port(9870), 50070);

        let uri = SourceUri::parse("webhdfs://nn/x.parquet").unwrap();
        assert_eq!(uri.webhdfs_port(9870), 9870);

        let uri = SourceUri::parse("s3://b/k.parquet").unwrap();
        assert_eq!(uri.webhdfs_port(9870), 9870);
    }

    #[test]
    fn test_parse_hdfs_missing_host() {
        assert!(SourceUri::parse("hdfs:///data/file.parquet").is_err());
    }

    #[test]
    fn test_parse_hdfs_missing_path() {
        assert!(SourceUri::parse("hdfs://namenode:9870/").is_err());
    }

    #[test]
    fn test_parse_s3_uri() {
        let uri = SourceUri::parse("s3://my-bucket/path/to/file.parquet").unwrap();
        match uri {
            SourceUri::S3 { bucket, key } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(key, "path/to/file.parquet");
            }
            _ => panic!("Expected S3 URI"),
        }
    }

    #[test]
    fn test_parse_s3_missing_bucket() {
        let result = SourceUri::parse("s3:///file.parquet");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_s3_missing_key() {
        let result = SourceUri::parse("s3://bucket/");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_local_path() {
        let uri = SourceUri::parse("/data/file.parquet").unwrap();
        assert!(matches!(uri, SourceUri::Local(_)));
    }

    #[test]
    fn test_parse_relative_path() {
        let uri = SourceUri::parse("data/file.parquet").unwrap();
        assert!(matches!(uri, SourceUri::Local(_)));
    }

    #[test]
    fn test_parse_file_uri() {
        let uri = SourceUri::parse("file:///data/file.parquet").unwrap();
        assert_eq!(uri, SourceUri::Local(PathBuf::from("/data/file.parquet")));
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        let err = SourceUri::parse("ftp://host/file.parquet").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_display() {
        let uri = SourceUri::parse("hdfs://nn:8020/x.parquet").unwrap();
        assert_eq!(uri.to_string(), "hdfs://nn:8020/x.parquet");
        let uri = SourceUri::parse("webhdfs://nn:50070/x.parquet").unwrap();
        assert_eq!(uri.to_string(), "webhdfs://nn:50070/x.parquet");
        let uri = SourceUri::parse("s3://b/k.parquet").unwrap();
        assert_eq!(uri.to_string(), "s3://b/k.parquet");
    }
}
