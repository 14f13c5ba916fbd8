//! S3-compatible storage (Wasabi in production).

use async_trait::async_trait;
use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::fetch::{fetch_bytes, http_client, DEFAULT_FETCH_TIMEOUT};
use crate::keys::{content_type_for, validate_key};
use crate::storage::ObjectStorage;

/// Default endpoint when none is configured.
pub const DEFAULT_S3_ENDPOINT: &str = "https://s3.wasabisys.com";
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub region: String,
    /// Base for public object URLs (CDN or bucket website); defaults to
    /// path-style `{endpoint}/{bucket}`
    pub public_base_url: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .unwrap_or_else(|_| DEFAULT_S3_ENDPOINT.to_string()),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            public_base_url: std::env::var("S3_PUBLIC_BASE_URL").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Public URL of an object.
    pub fn public_url(&self, key: &str) -> String {
        let encoded = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), encoded),
            None => format!(
                "{}/{}/{}",
                self.endpoint_url.trim_end_matches('/'),
                self.bucket_name,
                encoded
            ),
        }
    }
}

/// S3-compatible object storage.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    config: S3Config,
    http: reqwest::Client,
}

impl S3Storage {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vads-s3",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            http: http_client(DEFAULT_FETCH_TIMEOUT)?,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(S3Config::from_env()?)
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    async fn put(&self, body: ByteStream, content_type: &str, key: &str) -> StorageResult<String> {
        validate_key(key)?;
        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{key}: {e}")))?;
        Ok(self.config.public_url(key))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn upload_file(&self, path: &Path, content_type: &str, key: &str) -> StorageResult<String> {
        debug!(path = %path.display(), key, "Uploading file");

        if !path.exists() {
            return Err(StorageError::not_found(path.display().to_string()));
        }
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let url = self.put(body, content_type, key).await?;
        info!(key, bucket = %self.config.bucket_name, "Uploaded file");
        Ok(url)
    }

    async fn upload_bytes(&self, data: Vec<u8>, content_type: &str, key: &str) -> StorageResult<String> {
        debug!(bytes = data.len(), key, "Uploading bytes");
        self.put(ByteStream::from(data), content_type, key).await
    }

    async fn upload_from_url(&self, url: &str, key: &str) -> StorageResult<String> {
        let fetched = fetch_bytes(&self.http, url).await?;
        let content_type = fetched
            .content_type
            .unwrap_or_else(|| content_type_for(key).to_string());
        info!(source = url, key, bytes = fetched.bytes.len(), "Re-hosting remote object");
        self.upload_bytes(fetched.bytes, &content_type, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public: Option<&str>) -> S3Config {
        S3Config {
            endpoint_url: "https://s3.wasabisys.com/".to_string(),
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "vads-media".to_string(),
            region: DEFAULT_S3_REGION.to_string(),
            public_base_url: public.map(str::to_string),
        }
    }

    #[test]
    fn test_public_url_path_style() {
        let url = config(None).public_url("org/proj/video_clip/compiled_a.mp4");
        assert_eq!(url, "https://s3.wasabisys.com/vads-media/org/proj/video_clip/compiled_a.mp4");
    }

    #[test]
    fn test_public_url_with_cdn_and_encoding() {
        let url = config(Some("https://cdn.example.com/")).public_url("org/my proj/a.mp4");
        assert_eq!(url, "https://cdn.example.com/org/my%20proj/a.mp4");
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_key_before_network() {
        let storage = S3Storage::new(config(None)).unwrap();
        let err = storage
            .upload_bytes(b"x".to_vec(), "video/mp4", "../escape.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
