//! Fetching source objects by URL.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Default timeout for a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Body of a fetched object.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Build the shared HTTP client used for fetches.
pub fn http_client(timeout: Duration) -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StorageError::config_error(format!("failed to build HTTP client: {e}")))
}

/// Where a source object lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    Remote(Url),
}

impl SourceLocation {
    /// Classify a source string: http(s) URLs are remote, `file://` URLs and
    /// bare paths are local. Any other scheme is rejected.
    pub fn parse(source: &str) -> StorageResult<Self> {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(SourceLocation::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(SourceLocation::Local)
                .map_err(|()| StorageError::unsupported_source(format!("invalid file URL: {source}"))),
            // Windows drive letters parse as a one-letter scheme
            Ok(url) if url.scheme().len() > 1 => Err(StorageError::unsupported_source(format!(
                "unsupported scheme {:?} in {source}",
                url.scheme()
            ))),
            _ => Ok(SourceLocation::Local(PathBuf::from(source))),
        }
    }
}

/// Fetch an object over HTTP(S), or read it from disk for local sources.
pub async fn fetch_bytes(http: &reqwest::Client, source: &str) -> StorageResult<Fetched> {
    let url = match SourceLocation::parse(source)? {
        SourceLocation::Remote(url) => url,
        SourceLocation::Local(path) => {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::not_found(path.display().to_string())
                } else {
                    StorageError::Io(e)
                }
            })?;
            return Ok(Fetched {
                bytes,
                content_type: None,
            });
        }
    };

    debug!(url = %url, "Fetching object");
    let response = http.get(url).send().await?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::not_found(source));
    }
    if !status.is_success() {
        return Err(StorageError::fetch_failed(format!("GET {source} returned {status}")));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let bytes = response.bytes().await?.to_vec();

    Ok(Fetched {
        bytes,
        content_type,
    })
}
