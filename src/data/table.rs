use crate::error::PipelineError;
use anyhow::{Context, Result};
use std::path::Path;

/// One row of the tabular intermediate file, cells in header order.
pub type PriceRecord = Vec<String>;

/// In-memory form of the comma-separated intermediate files passed between steps.
///
/// The first line of the file is the header row; every following line is one
/// trading day as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    pub headers: Vec<String>,
    pub rows: Vec<PriceRecord>,
}

impl PriceTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the named column.
    pub fn column(&self, name: &str) -> Result<usize, PipelineError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                name: name.to_string(),
            })
    }

    /// Cells of the named column, top to bottom.
    pub fn column_values(&self, name: &str) -> Result<Vec<&str>, PipelineError> {
        let idx = self.column(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
            .collect())
    }

    /// Appends a column to the right of the existing ones.
    ///
    /// `cells` must hold exactly one value per row.
    pub fn append_column(&mut self, name: impl Into<String>, cells: Vec<String>) -> Result<()> {
        let name = name.into();
        anyhow::ensure!(
            cells.len() == self.rows.len(),
            "column '{}' has {} cells for {} rows",
            name,
            cells.len(),
            self.rows.len()
        );

        let width = self.headers.len();
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.resize(width, String::new());
            row.push(cell);
        }
        self.headers.push(name);
        Ok(())
    }

    /// Loads a table from a CSV file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut table = Self::new(headers);
        for (row, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Malformed CSV row in {}", path.display()))?;
            // Short rows are padded later; extra cells would have no column to land in.
            if record.len() > table.headers.len() {
                return Err(PipelineError::RowTooWide {
                    row,
                    cells: record.len(),
                    headers: table.headers.len(),
                })
                .with_context(|| format!("Malformed CSV row in {}", path.display()));
            }
            table.rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(table)
    }

    /// Writes the table to `path`, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }

        writer.flush()?;
        Ok(())
    }
}
