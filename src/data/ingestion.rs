use super::PriceTable;
use crate::config::Settings;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Body of `historical-price-full`. Unknown symbols come back as `{}`.
#[derive(Debug, Deserialize)]
struct HistoricalPriceResponse {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    historical: Option<Value>,
}

/// Fetches daily price history from the provider's `historical-price-full` endpoint.
///
/// The request carries no timeout and is never retried here; a failed fetch
/// fails the step and the scheduler decides what happens next.
pub struct Fetcher {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api_key.clone(), settings.api_base_url.clone())
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/historical-price-full/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }

    /// Requests up to `timeseries` most recent daily records for `symbol`.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the request fails or the provider answers with a non-success status
    /// - the body is not JSON or has no `historical` array
    /// - the `historical` array is empty
    ///
    /// # Returns
    /// A table with one row per record, in the order the provider sent them
    /// (most recent first for this provider).
    pub async fn fetch(&self, symbol: &str, timeseries: usize) -> Result<PriceTable> {
        let response = self
            .client
            .get(self.url(symbol))
            .query(&[
                ("timeseries", timeseries.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await
            .context("price history request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to read price history response")?;

        if !status.is_success() {
            anyhow::bail!("price history HTTP {status}: {text}");
        }

        let body = serde_json::from_str::<HistoricalPriceResponse>(&text)
            .with_context(|| format!("unexpected price history response: {text}"))?;

        let records = body
            .historical
            .as_ref()
            .and_then(Value::as_array)
            .ok_or(PipelineError::MissingKey { key: "historical" })?;

        if records.is_empty() {
            return Err(PipelineError::EmptyHistory {
                symbol: symbol.to_string(),
            }
            .into());
        }

        let table = records_to_table(records)?;
        tracing::debug!(
            symbol,
            reported_symbol = body.symbol.as_deref().unwrap_or(""),
            rows = table.len(),
            columns = table.headers.len(),
            "parsed price history"
        );
        Ok(table)
    }

    /// Fetches the history and writes it to `raw_path`, replacing any earlier file.
    ///
    /// Returns the number of rows written.
    pub async fn extract(&self, symbol: &str, timeseries: usize, raw_path: &Path) -> Result<usize> {
        let table = self.fetch(symbol, timeseries).await?;
        table.write_csv(raw_path)?;

        tracing::info!(symbol, rows = table.len(), path = %raw_path.display(), "wrote raw price file");
        Ok(table.len())
    }
}

/// Flattens JSON records into a table.
///
/// Columns are the union of record keys in first-seen order, so the provider's
/// field order carries through to the file. Fields a record lacks stay empty.
fn records_to_table(records: &[Value]) -> Result<PriceTable> {
    let objects = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            record
                .as_object()
                .with_context(|| format!("historical record {i} is not an object"))
        })
        .collect::<Result<Vec<&Map<String, Value>>>>()?;

    let mut headers: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let mut table = PriceTable::new(headers);
    for object in objects {
        let row = table
            .headers
            .iter()
            .map(|h| object.get(h).map(cell_text).unwrap_or_default())
            .collect();
        table.rows.push(row);
    }

    Ok(table)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
