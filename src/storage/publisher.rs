use super::{object_key, ObjectStore};
use crate::pipeline::{ArtifactPaths, RunContext};
use anyhow::{Context, Result};

/// Uploads the enriched file and removes the run's intermediate files.
///
/// Cleanup happens only after the upload returns successfully. A failed upload
/// leaves both files on disk so the run can be inspected or the load retried.
pub struct Publisher<S> {
    store: S,
    bucket: String,
}

impl<S: ObjectStore> Publisher<S> {
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Publishes `artifacts.enriched` under `{SYMBOL}_{ds}.csv` and returns the key.
    ///
    /// # Errors
    /// Returns an error if the upload fails (files are kept) or if either
    /// intermediate file is already gone when cleanup runs.
    pub async fn publish(&self, ctx: &RunContext, artifacts: &ArtifactPaths) -> Result<String> {
        let key = object_key(&ctx.symbol, ctx.logical_date);

        self.store
            .put_file(&self.bucket, &key, &artifacts.enriched)
            .await?;

        tracing::info!(
            store = self.store.store_name(),
            bucket = %self.bucket,
            key = %key,
            "file is successfully uploaded to s3://{}/{}",
            self.bucket,
            key
        );

        for path in [&artifacts.raw, &artifacts.enriched] {
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }

        Ok(key)
    }
}
