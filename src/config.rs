use crate::data::WindowOrder;
use crate::error::PipelineError;
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_SYMBOL: &str = "AAPL";
pub const DEFAULT_TIMESERIES: usize = 200;
pub const DEFAULT_API_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const DEFAULT_WORK_DIR: &str = "/tmp";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Process-wide settings, resolved once at startup and handed to each step.
///
/// Required: `API_KEY`, `AWS_ACCESS_KEY`, `AWS_SECRET_KEY`, `S3_BUCKET`.
/// Everything else falls back to a default.
#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub s3_bucket: String,
    pub symbol: String,
    pub timeseries: usize,
    pub api_base_url: String,
    pub work_dir: PathBuf,
    pub aws_region: String,
    pub aws_endpoint_url: Option<String>,
    pub window_order: WindowOrder,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(PipelineError::MissingSetting { key });

        let timeseries = match get("TIMESERIES") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(PipelineError::InvalidSetting {
                        key: "TIMESERIES",
                        value: raw,
                    }
                    .into())
                }
            },
            None => DEFAULT_TIMESERIES,
        };

        let window_order = match get("SMA_ORDER") {
            Some(raw) => raw.parse::<WindowOrder>().map_err(|_| PipelineError::InvalidSetting {
                key: "SMA_ORDER",
                value: raw,
            })?,
            None => WindowOrder::AsReceived,
        };

        Ok(Self {
            api_key: require("API_KEY")?,
            aws_access_key: require("AWS_ACCESS_KEY")?,
            aws_secret_key: require("AWS_SECRET_KEY")?,
            s3_bucket: require("S3_BUCKET")?,
            symbol: get("STOCK_SYMBOL")
                .map(|s| s.to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            timeseries,
            api_base_url: get("PRICE_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            work_dir: get("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            aws_region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            aws_endpoint_url: get("AWS_ENDPOINT_URL"),
            window_order,
        })
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("aws_access_key", &"<redacted>")
            .field("aws_secret_key", &"<redacted>")
            .field("s3_bucket", &self.s3_bucket)
            .field("symbol", &self.symbol)
            .field("timeseries", &self.timeseries)
            .field("api_base_url", &self.api_base_url)
            .field("work_dir", &self.work_dir)
            .field("aws_region", &self.aws_region)
            .field("aws_endpoint_url", &self.aws_endpoint_url)
            .field("window_order", &self.window_order)
            .finish()
    }
}
