use thiserror::Error;

/// Configuration and data-shape failures raised by the pipeline steps.
///
/// Transport, filesystem and upload failures are not listed here; they travel as
/// `anyhow::Error` with context attached by the step that hit them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("required setting '{key}' is missing")]
    MissingSetting { key: &'static str },
    #[error("setting '{key}' has invalid value '{value}'")]
    InvalidSetting { key: &'static str, value: String },

    #[error("response is missing key '{key}'")]
    MissingKey { key: &'static str },
    #[error("no historical records returned for {symbol}")]
    EmptyHistory { symbol: String },

    #[error("row {row} has {cells} cells but the header has {headers}")]
    RowTooWide {
        row: usize,
        cells: usize,
        headers: usize,
    },
    #[error("column '{name}' not found")]
    MissingColumn { name: String },
    #[error("column '{column}' row {row} is not numeric: '{value}'")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },
    #[error("column '{column}' row {row} is not a YYYY-MM-DD date: '{value}'")]
    InvalidDate {
        column: String,
        row: usize,
        value: String,
    },

    #[error("moving average window must be at least 1")]
    ZeroWindow,
    #[error("cannot move pipeline from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}
