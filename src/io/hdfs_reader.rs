use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::io;
use std::time::Duration;
use url::Url;

use super::byte_reader::ByteReader;

/// Response body of `op=GETFILESTATUS`
#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: FileStatus,
}

#[derive(Debug, Deserialize)]
struct FileStatus {
    length: u64,
    #[serde(rename = "type")]
    kind: String,
}

/// ByteReader implementation for files on HDFS, read through the namenode's WebHDFS gateway
#[derive(Clone)]
pub struct HdfsByteReader {
    client: Client,
    base_url: Url,
    user: Option<String>,
}

impl HdfsByteReader {
    /// Create a new HdfsByteReader for `path` on the namenode at `host:port`
    pub fn new(
        host: &str,
        port: u16,
        path: &str,
        user: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{}:{}/webhdfs/v1{}", host, port, path))
            .with_context(|| format!("Invalid WebHDFS address for {}:{}{}", host, port, path))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build WebHDFS HTTP client")?;

        Ok(Self {
            client,
            base_url,
            user,
        })
    }

    /// Build the request URL for a WebHDFS operation
    fn op_url(&self, op: &str, extra: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            if let Some(ref user) = self.user {
                query.append_pair("user.name", user);
            }
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Turn a non-success response into an error; 404 maps to `NotFound`
    async fn check_status(response: reqwest::Response, url: &Url) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(anyhow::Error::new(io::Error::new(
                io::ErrorKind::NotFound,
                format!("WebHDFS path not found: {}", url.path()),
            )));
        }
        Err(anyhow!(
            "WebHDFS request {} failed with {}: {}",
            url.path(),
            status,
            body.trim()
        ))
    }
}

#[async_trait]
impl ByteReader for HdfsByteReader {
    async fn size(&self) -> Result<u64> {
        let url = self.op_url("GETFILESTATUS", &[]);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("Failed to get HDFS file status")?;
        let response = Self::check_status(response, &url).await?;

        let body = response
            .text()
            .await
            .context("Failed to read WebHDFS file status")?;
        let status: FileStatusResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse WebHDFS file status: {}", body.trim()))?;

        if status.file_status.kind != "FILE" {
            return Err(anyhow!(
                "HDFS path {} is a {}, not a file",
                url.path(),
                status.file_status.kind
            ));
        }

        Ok(status.file_status.length)
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end <= start {
            return Ok(Vec::new());
        }

        // OPEN redirects to a datanode; reqwest follows the redirect
        let url = self.op_url(
            "OPEN",
            &[
                ("offset", start.to_string()),
                ("length", (end - start).to_string()),
            ],
        );
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("Failed to read range from HDFS")?;
        let response = Self::check_status(response, &url).await?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to collect WebHDFS response body")?
            .to_vec();

        Ok(bytes)
    }
}
