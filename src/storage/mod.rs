pub mod publisher;
pub mod s3;

pub use publisher::Publisher;
pub use s3::S3ObjectStore;

use anyhow::Result;
use chrono::NaiveDate;
use std::path::Path;

/// Durable blob store the enriched file is uploaded to.
///
/// A put to an existing key replaces the object.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;
}

/// Object key for one run: `{SYMBOL}_{YYYY-MM-DD}.csv`.
pub fn object_key(symbol: &str, logical_date: NaiveDate) -> String {
    format!("{}_{}.csv", symbol, logical_date.format("%Y-%m-%d"))
}
