//! MinIO / S3-compatible object storage client.
//!
//! Wraps `aws-sdk-s3` for reading uploaded file bytes. The federation layer
//! uses this when relaying a locally stored file out to the remote network.

use anyhow::{Context, Result};
use aws_sdk_s3::{
    Client,
    config::{Builder as S3Builder, Credentials, Region},
};

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// MinIO / S3 endpoint URL (e.g. `http://localhost:9000`)
    pub endpoint: String,
    /// Access key
    pub access_key: String,
    /// Secret key
    pub secret_key: String,
    /// Bucket name
    pub bucket: String,
    /// Region (use `us-east-1` for MinIO)
    pub region: String,
}

/// S3/MinIO storage client — wraps the AWS SDK.
#[derive(Clone)]
pub struct StorageClient {
    inner: Client,
    bucket: String,
}

impl StorageClient {
    /// Initialise client from config.
    pub fn new(cfg: &StorageConfig) -> Result<Self> {
        let creds = Credentials::new(
            &cfg.access_key,
            &cfg.secret_key,
            None, // session token
            None, // expiry
            "commune-storage",
        );

        let s3_cfg = S3Builder::new()
            .endpoint_url(&cfg.endpoint)
            .credentials_provider(creds)
            .region(Region::new(cfg.region.clone()))
            // Force path-style URLs (required for MinIO)
            .force_path_style(true)
            .build();

        Ok(Self { inner: Client::from_conf(s3_cfg), bucket: cfg.bucket.clone() })
    }

    /// Fetch an object's bytes by its storage key.
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {key} from object storage"))?;

        let data = resp
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of {key}"))?;

        Ok(data.into_bytes().to_vec())
    }
}
