use super::PriceTable;
use crate::error::PipelineError;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::Path;
use std::str::FromStr;

pub const CLOSE_COLUMN: &str = "close";
pub const DATE_COLUMN: &str = "date";
pub const DEFAULT_WINDOWS: [usize; 2] = [50, 200];

/// Row order the trailing windows are computed over.
///
/// The provider sends the most recent day first. `AsReceived` runs the windows
/// straight down the file, so on that input each value averages the row and the
/// newer days above it. `Chronological` ranks rows by `date` first so each value
/// averages that day and the days before it. Output rows keep the input order
/// in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowOrder {
    #[default]
    AsReceived,
    Chronological,
}

impl FromStr for WindowOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "as_received" | "as-received" => Ok(Self::AsReceived),
            "chronological" => Ok(Self::Chronological),
            other => Err(format!("unknown window order '{other}'")),
        }
    }
}

/// Simple moving average over `values` with a window of `period`.
///
/// Position `i` holds the mean of `values[i + 1 - period..=i]`, or `None` while
/// fewer than `period` values are available.
pub fn simple_moving_average(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, PipelineError> {
    if period == 0 {
        return Err(PipelineError::ZeroWindow);
    }

    let mut averages = vec![None; values.len().min(period - 1)];
    averages.extend(
        values
            .windows(period)
            .map(|window| Some(window.iter().sum::<f64>() / period as f64)),
    );

    Ok(averages)
}

/// Appends trailing simple moving averages of the close price to a raw price table.
pub struct Enricher {
    windows: Vec<usize>,
    order: WindowOrder,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOWS.to_vec(), WindowOrder::AsReceived)
    }
}

impl Enricher {
    pub fn new(windows: Vec<usize>, order: WindowOrder) -> Self {
        Self { windows, order }
    }

    pub fn with_order(order: WindowOrder) -> Self {
        Self::new(DEFAULT_WINDOWS.to_vec(), order)
    }

    /// Header name of the column holding the `period` average, e.g. `50_SMA`.
    pub fn column_name(period: usize) -> String {
        format!("{period}_SMA")
    }

    /// Adds one `{period}_SMA` column per configured window.
    ///
    /// Incomplete windows are left as empty cells. The table is only modified
    /// once every column has been computed.
    pub fn enrich(&self, table: &mut PriceTable) -> Result<()> {
        let closes = parse_closes(table)?;
        let ranking = match self.order {
            WindowOrder::AsReceived => (0..closes.len()).collect::<Vec<_>>(),
            WindowOrder::Chronological => chronological_ranking(table)?,
        };
        let ordered = ranking.iter().map(|&i| closes[i]).collect::<Vec<_>>();

        let mut columns = Vec::with_capacity(self.windows.len());
        for &period in &self.windows {
            let averages = simple_moving_average(&ordered, period)?;

            let mut cells = vec![String::new(); closes.len()];
            for (&row, average) in ranking.iter().zip(averages) {
                if let Some(value) = average {
                    // `{:?}` keeps the trailing `.0` on whole numbers.
                    cells[row] = format!("{value:?}");
                }
            }
            columns.push((Self::column_name(period), cells));
        }

        for (name, cells) in columns {
            table.append_column(name, cells)?;
        }
        Ok(())
    }

    /// Reads `raw_path`, enriches it, and writes the result to `enriched_path`.
    ///
    /// Returns the number of rows written.
    pub fn transform(&self, raw_path: &Path, enriched_path: &Path) -> Result<usize> {
        let mut table = PriceTable::read_csv(raw_path)?;
        if table.is_empty() {
            tracing::warn!(path = %raw_path.display(), "raw price file has no rows");
        }
        self.enrich(&mut table)?;
        table.write_csv(enriched_path)?;

        tracing::info!(
            rows = table.len(),
            windows = ?self.windows,
            order = ?self.order,
            path = %enriched_path.display(),
            "wrote enriched price file"
        );
        Ok(table.len())
    }
}

fn parse_closes(table: &PriceTable) -> Result<Vec<f64>, PipelineError> {
    table
        .column_values(CLOSE_COLUMN)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.trim()
                .parse::<f64>()
                .map_err(|_| PipelineError::InvalidNumber {
                    column: CLOSE_COLUMN.to_string(),
                    row,
                    value: cell.to_string(),
                })
        })
        .collect()
}

/// Row indices sorted oldest day first. Ties keep their file order.
fn chronological_ranking(table: &PriceTable) -> Result<Vec<usize>, PipelineError> {
    let dates = table
        .column_values(DATE_COLUMN)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            // Intraday providers append a time; only the day matters here.
            let day = cell.trim().get(..10).unwrap_or(cell.trim());
            NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| PipelineError::InvalidDate {
                column: DATE_COLUMN.to_string(),
                row,
                value: cell.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut ranking = (0..dates.len()).collect::<Vec<_>>();
    ranking.sort_by_key(|&i| dates[i]);
    Ok(ranking)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(rows: &[(&str, f64)]) -> PriceTable {
        let mut table = PriceTable::new(vec!["date".into(), "open".into(), "close".into()]);
        for (date, close) in rows {
            table
                .rows
                .push(vec![date.to_string(), "1".into(), close.to_string()]);
        }
        table
    }

    fn parsed(cell: &str) -> Option<f64> {
        if cell.is_empty() {
            None
        } else {
            Some(cell.parse().unwrap())
        }
    }

    #[test]
    fn test_moving_average_calculation() {
        let averages = simple_moving_average(&[10.0, 12.0, 11.0, 13.0, 15.0], 3).unwrap();
        assert_eq!(averages.len(), 5);
        assert_eq!(averages[0], None);
        assert_eq!(averages[1], None);
        assert_eq!(averages[2], Some(11.0));
        assert_eq!(averages[4], Some(13.0));
    }

    #[test]
    fn test_short_series_is_entirely_undefined() {
        let values = vec![1.0; 49];
        let averages = simple_moving_average(&values, 50).unwrap();
        assert_eq!(averages.len(), 49);
        assert!(averages.iter().all(Option::is_none));
    }

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            simple_moving_average(&[1.0], 0),
            Err(PipelineError::ZeroWindow)
        );
    }

    #[test]
    fn test_long_window_leading_gap_and_means() {
        let values: Vec<f64> = (0..260).map(|i| 100.0 + (i % 7) as f64 * 1.5).collect();
        let averages = simple_moving_average(&values, 200).unwrap();

        assert_eq!(averages.iter().take_while(|a| a.is_none()).count(), 199);
        for i in 199..values.len() {
            let expected = values[i - 199..=i].iter().sum::<f64>() / 200.0;
            assert!((averages[i].unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_enrich_appends_columns_without_touching_rows() {
        let mut table = table_from(&[
            ("2025-01-05", 10.0),
            ("2025-01-04", 12.0),
            ("2025-01-03", 11.0),
            ("2025-01-02", 13.0),
            ("2025-01-01", 15.0),
        ]);
        let original = table.clone();

        Enricher::new(vec![3], WindowOrder::AsReceived)
            .enrich(&mut table)
            .unwrap();

        assert_eq!(table.headers, vec!["date", "open", "close", "3_SMA"]);
        for (before, after) in original.rows.iter().zip(&table.rows) {
            assert_eq!(&after[..3], &before[..]);
        }
        let sma = table.column_values("3_SMA").unwrap();
        assert_eq!(sma, vec!["", "", "11.0", "12.0", "13.0"]);
        assert_eq!(parsed(sma[4]), Some(13.0));
    }

    #[test]
    fn test_chronological_order_averages_past_days() {
        // newest first, as the provider sends it
        let mut table = table_from(&[
            ("2025-01-05", 15.0),
            ("2025-01-04", 13.0),
            ("2025-01-03", 11.0),
            ("2025-01-02", 12.0),
            ("2025-01-01", 10.0),
        ]);

        Enricher::new(vec![3], WindowOrder::Chronological)
            .enrich(&mut table)
            .unwrap();

        let sma = table.column_values("3_SMA").unwrap();
        // Oldest two days lack a full window.
        assert_eq!(sma[3], "");
        assert_eq!(sma[4], "");
        assert_eq!(parsed(sma[0]), Some(13.0));
        assert_eq!(parsed(sma[2]), Some(11.0));
        assert_eq!(table.rows[0][0], "2025-01-05");
    }

    #[test]
    fn test_as_received_order_differs_on_newest_first_input() {
        let rows = [
            ("2025-01-05", 15.0),
            ("2025-01-04", 13.0),
            ("2025-01-03", 11.0),
            ("2025-01-02", 12.0),
            ("2025-01-01", 10.0),
        ];
        let mut as_received = table_from(&rows);
        Enricher::new(vec![3], WindowOrder::AsReceived)
            .enrich(&mut as_received)
            .unwrap();

        let sma = as_received.column_values("3_SMA").unwrap();
        assert_eq!(sma[0], "");
        assert_eq!(parsed(sma[4]), Some(11.0));
    }

    #[test]
    fn test_missing_close_column_fails() {
        let mut table = PriceTable::new(vec!["date".into(), "open".into()]);
        table.rows.push(vec!["2025-01-01".into(), "1".into()]);

        let err = Enricher::default().enrich(&mut table).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::MissingColumn {
                name: "close".into()
            })
        );
        assert_eq!(table.headers.len(), 2);
    }

    #[test]
    fn test_non_numeric_close_fails_before_any_column_is_added() {
        let mut table = table_from(&[("2025-01-02", 1.0)]);
        table.rows.push(vec!["2025-01-01".into(), "1".into(), "n/a".into()]);

        let err = Enricher::new(vec![1], WindowOrder::AsReceived)
            .enrich(&mut table)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidNumber { row: 1, .. })
        ));
        assert_eq!(table.headers.len(), 3);
    }

    #[test]
    fn test_transform_round_trips_date_close_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.csv");
        let enriched_path = dir.path().join("enriched.csv");

        let rows: Vec<(String, f64)> = (0..60)
            .map(|i| (format!("2025-03-{:02}", (i % 28) + 1), 100.0 + i as f64 * 0.25))
            .collect();
        let borrowed: Vec<(&str, f64)> = rows.iter().map(|(d, c)| (d.as_str(), *c)).collect();
        table_from(&borrowed).write_csv(&raw_path).unwrap();

        let written = Enricher::default()
            .transform(&raw_path, &enriched_path)
            .unwrap();
        assert_eq!(written, 60);

        let raw = PriceTable::read_csv(&raw_path).unwrap();
        let enriched = PriceTable::read_csv(&enriched_path).unwrap();
        assert_eq!(enriched.headers, vec!["date", "open", "close", "50_SMA", "200_SMA"]);

        let pairs = |t: &PriceTable| {
            t.column_values("date")
                .unwrap()
                .into_iter()
                .zip(t.column_values("close").unwrap())
                .map(|(d, c)| (d.to_string(), c.to_string()))
                .collect::<Vec<_>>()
        };
        assert_eq!(pairs(&raw), pairs(&enriched));

        let sma_50 = enriched.column_values("50_SMA").unwrap();
        assert_eq!(sma_50.iter().filter(|c| c.is_empty()).count(), 49);
        assert!(enriched
            .column_values("200_SMA")
            .unwrap()
            .iter()
            .all(|c| c.is_empty()));
    }

    #[test]
    fn test_fractional_average_keeps_shortest_form() {
        let mut table = table_from(&[("2025-01-02", 100.25), ("2025-01-01", 100.5)]);
        Enricher::new(vec![2], WindowOrder::AsReceived)
            .enrich(&mut table)
            .unwrap();
        assert_eq!(table.column_values("2_SMA").unwrap(), vec!["", "100.375"]);
    }

    #[test]
    fn test_transform_header_only_file_writes_header_only_output() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.csv");
        let enriched_path = dir.path().join("enriched.csv");
        std::fs::write(&raw_path, "date,open,close\n").unwrap();

        let written = Enricher::default()
            .transform(&raw_path, &enriched_path)
            .unwrap();
        assert_eq!(written, 0);

        let enriched = PriceTable::read_csv(&enriched_path).unwrap();
        assert!(enriched.is_empty());
        assert_eq!(enriched.headers, vec!["date", "open", "close", "50_SMA", "200_SMA"]);
    }

    #[test]
    fn test_transform_missing_raw_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let enriched_path = dir.path().join("enriched.csv");
        assert!(Enricher::default()
            .transform(&dir.path().join("absent.csv"), &enriched_path)
            .is_err());
        assert!(!enriched_path.exists());
    }

    #[test]
    fn test_window_order_parses() {
        assert_eq!(
            "chronological".parse::<WindowOrder>(),
            Ok(WindowOrder::Chronological)
        );
        assert_eq!(
            "AS_RECEIVED".parse::<WindowOrder>(),
            Ok(WindowOrder::AsReceived)
        );
        assert!("sideways".parse::<WindowOrder>().is_err());
    }
}
