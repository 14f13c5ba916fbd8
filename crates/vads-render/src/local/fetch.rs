//! Source fetching into the job workspace.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use vads_storage::SourceLocation;

use crate::error::{RenderError, RenderResult, RenderStep};

/// File extension for a source, falling back to `default`.
pub fn source_extension(source: &str, default: &str) -> String {
    let path = match Url::parse(source) {
        Ok(url) => url.path().to_string(),
        Err(_) => source.to_string(),
    };
    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| default.to_string())
}

/// Make `source` available as a local file.
///
/// Local files are used in place; remote ones are streamed to
/// `dest_dir/{stem}.{ext}`.
pub async fn fetch_source(
    http: &Client,
    source: &str,
    dest_dir: &Path,
    stem: &str,
    default_ext: &str,
) -> RenderResult<PathBuf> {
    let location = SourceLocation::parse(source)
        .map_err(|e| RenderError::failed(RenderStep::Fetch, e.to_string()))?;
    match location {
        SourceLocation::Local(path) => {
            if tokio::fs::metadata(&path).await.is_err() {
                return Err(RenderError::failed(
                    RenderStep::Fetch,
                    format!("source not found: {}", path.display()),
                ));
            }
            Ok(path)
        }
        SourceLocation::Remote(url) => {
            let dest = dest_dir.join(format!("{stem}.{}", source_extension(source, default_ext)));
            download(http, url, &dest).await?;
            Ok(dest)
        }
    }
}

async fn download(http: &Client, url: Url, dest: &Path) -> RenderResult<()> {
    let fetch_err = |e: reqwest::Error| RenderError::failed(RenderStep::Fetch, e.to_string());
    let io_err = |e: std::io::Error| RenderError::failed(RenderStep::Fetch, e.to_string());

    let response = http
        .get(url.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;

    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(fetch_err)?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;

    if written == 0 {
        return Err(RenderError::failed(
            RenderStep::Fetch,
            format!("empty response body from {url}"),
        ));
    }

    debug!(url = %url, bytes = written, dest = %dest.display(), "Downloaded source");
    Ok(())
}
