use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use crate::errors::AppError;
use crate::models::{FilteredTable, MetricRecord, RecordError, Report, ResultTable, Thresholds, TickerMetrics};

/// One exported row. Error rows and a missing P/E leave their cells blank.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "CAGR (%)")]
    cagr: Option<f64>,
    #[serde(rename = "Volatility (%)")]
    volatility: Option<f64>,
    #[serde(rename = "Max Drawdown (%)")]
    max_drawdown: Option<f64>,
    #[serde(rename = "P/E Ratio")]
    pe_ratio: Option<f64>,
}

impl From<&MetricRecord> for CsvRow {
    fn from(record: &MetricRecord) -> Self {
        let m = record.metrics();
        Self {
            ticker: record.ticker.clone(),
            cagr: m.map(|m| m.cagr),
            volatility: m.map(|m| m.volatility),
            max_drawdown: m.map(|m| m.max_drawdown),
            pe_ratio: m.and_then(|m| m.pe_ratio),
        }
    }
}

impl From<CsvRow> for MetricRecord {
    fn from(row: CsvRow) -> Self {
        match (row.cagr, row.volatility, row.max_drawdown) {
            (Some(cagr), Some(volatility), Some(max_drawdown)) => MetricRecord::with_metrics(
                row.ticker,
                TickerMetrics {
                    cagr,
                    volatility,
                    max_drawdown,
                    pe_ratio: row.pe_ratio,
                },
            ),
            _ => MetricRecord::with_error(row.ticker, RecordError::NoData),
        }
    }
}

pub struct ReportBuilder;

impl ReportBuilder {
    /// Keep records passing `thresholds`, sorted by CAGR descending.
    ///
    /// The sort is stable, so ties keep their request order. Error rows never pass.
    pub fn build(records: Vec<MetricRecord>, thresholds: &Thresholds) -> Report {
        let mut filtered: Vec<MetricRecord> = records
            .iter()
            .filter(|r| r.metrics().is_some_and(|m| thresholds.accepts(m)))
            .cloned()
            .collect();

        filtered.sort_by(|a, b| cagr_of(b).total_cmp(&cagr_of(a)));

        info!(
            "📋 {} of {} tickers meet the steady-performer criteria",
            filtered.len(),
            records.len()
        );

        Report {
            results: ResultTable::new(records),
            filtered: FilteredTable {
                records: filtered,
                thresholds: *thresholds,
            },
        }
    }
}

fn cagr_of(record: &MetricRecord) -> f64 {
    record.metrics().map_or(f64::NEG_INFINITY, |m| m.cagr)
}

impl ResultTable {
    /// Write the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        if self.records.is_empty() {
            wtr.write_record(["Ticker", "CAGR (%)", "Volatility (%)", "Max Drawdown (%)", "P/E Ratio"])?;
        }
        for record in &self.records {
            wtr.serialize(CsvRow::from(record))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file at `path`, replacing any existing file.
    pub fn export(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))?;
        info!("✅ Results exported to {}", path.display());
        Ok(())
    }

    /// Read a table previously written by [`ResultTable::write_csv`].
    ///
    /// Rows with blank metric cells come back as `No Data`.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let records = rdr
            .deserialize::<CsvRow>()
            .map(|row| row.map(MetricRecord::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ticker: &str, cagr: f64, volatility: f64, pe: Option<f64>) -> MetricRecord {
        MetricRecord::with_metrics(
            ticker,
            TickerMetrics {
                cagr,
                volatility,
                max_drawdown: -12.5,
                pe_ratio: pe,
            },
        )
    }

    fn tickers(records: &[MetricRecord]) -> Vec<&str> {
        records.iter().map(|r| r.ticker.as_str()).collect()
    }

    #[test]
    fn test_filtered_is_subset_sorted_by_cagr() {
        let records = vec![
            ok("AAA", 8.0, 18.0, Some(20.0)),
            ok("BBB", 15.0, 22.0, Some(25.0)),
            ok("CCC", 30.0, 40.0, Some(20.0)),
            MetricRecord::with_error("DDD", RecordError::NoData),
            ok("EEE", 12.0, 10.0, Some(12.0)),
        ];

        let report = ReportBuilder::build(records.clone(), &Thresholds::default());

        assert_eq!(report.results.records, records);
        assert_eq!(tickers(&report.filtered.records), vec!["BBB", "EEE", "AAA"]);
        for r in &report.filtered.records {
            assert!(report.results.records.contains(r));
            assert!(Thresholds::default().accepts(r.metrics().unwrap()));
        }
    }

    #[test]
    fn test_missing_pe_and_error_rows_never_filtered() {
        let records = vec![
            ok("NOPE", 20.0, 10.0, None),
            MetricRecord::with_error("GONE", RecordError::InsufficientData),
        ];
        let report = ReportBuilder::build(records, &Thresholds::default());
        assert!(report.filtered.records.is_empty());
        assert!(report.has_data());
    }

    #[test]
    fn test_ties_keep_request_order() {
        let records = vec![
            ok("ZZZ", 10.0, 10.0, Some(15.0)),
            ok("AAA", 10.0, 12.0, Some(16.0)),
            ok("MMM", 11.0, 12.0, Some(16.0)),
        ];
        let report = ReportBuilder::build(records, &Thresholds::default());
        assert_eq!(tickers(&report.filtered.records), vec!["MMM", "ZZZ", "AAA"]);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = Thresholds {
            max_volatility: 50.0,
            min_cagr: 0.0,
            pe_band: (0.0, 100.0),
        };
        let report = ReportBuilder::build(vec![ok("CCC", 30.0, 40.0, Some(60.0))], &thresholds);
        assert_eq!(report.filtered.records.len(), 1);
        assert_eq!(report.filtered.thresholds, thresholds);
    }

    #[test]
    fn test_all_errors_has_no_data() {
        let report = ReportBuilder::build(
            vec![MetricRecord::with_error("X", RecordError::NoData)],
            &Thresholds::default(),
        );
        assert!(!report.has_data());
    }

    #[test]
    fn test_csv_layout() {
        let table = ResultTable::new(vec![
            ok("AAPL", 21.5, 28.12, Some(29.37)),
            ok("MSFT", 18.0, 22.4, None),
            MetricRecord::with_error("XYZ", RecordError::NoData),
        ]);

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Ticker,CAGR (%),Volatility (%),Max Drawdown (%),P/E Ratio");
        assert_eq!(lines[1], "AAPL,21.5,28.12,-12.5,29.37");
        assert_eq!(lines[2], "MSFT,18.0,22.4,-12.5,");
        assert_eq!(lines[3], "XYZ,,,,");
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let mut buf = Vec::new();
        ResultTable::default().write_csv(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Ticker,CAGR (%),Volatility (%),Max Drawdown (%),P/E Ratio\n"
        );
    }

    #[test]
    fn test_csv_read_back() {
        let table = ResultTable::new(vec![
            ok("AAPL", 21.5, 28.12, Some(29.37)),
            MetricRecord::with_error("XYZ", RecordError::NoData),
            ok("MSFT", -3.25, 22.4, None),
        ]);

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let read = ResultTable::read_csv(buf.as_slice()).unwrap();

        assert_eq!(read, table);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = ResultTable::new(vec![ok("AAPL", 21.5, 28.12, Some(29.37))]);

        table.export(&path).unwrap();

        let read = ResultTable::read_csv(File::open(&path).unwrap()).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn test_export_to_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.csv");
        let err = ResultTable::default().export(&path).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn test_csv_read_rejects_garbage() {
        let input = "Ticker,CAGR (%),Volatility (%),Max Drawdown (%),P/E Ratio\nAAPL,abc,1,2,3\n";
        assert!(ResultTable::read_csv(input.as_bytes()).is_err());
    }
}
