use super::ObjectStore;
use crate::config::Settings;
use anyhow::{Context, Result};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

/// S3 (or S3-compatible) backend authenticated with a static access-key pair.
///
/// No timeout is set on the upload beyond the SDK defaults.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn from_settings(settings: &Settings) -> Self {
        let credentials = Credentials::new(
            settings.aws_access_key.clone(),
            settings.aws_secret_key.clone(),
            None,
            None,
            "stock_etl_settings",
        );

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.aws_region.clone()))
            .credentials_provider(credentials);

        // S3-compatible stores (MinIO, LocalStack) want path-style addressing.
        if let Some(endpoint) = &settings.aws_endpoint_url {
            config = config.endpoint_url(endpoint.clone()).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(config.build()),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    fn store_name(&self) -> &'static str {
        "s3"
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("failed to open {} for upload", path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .with_context(|| format!("upload to s3://{bucket}/{key} failed"))?;

        Ok(())
    }
}
