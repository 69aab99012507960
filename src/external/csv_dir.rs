use crate::external::price_frame::{ColumnLabel, PriceFrame};
use crate::external::price_provider::{
    Fundamentals, PriceProvider, PriceProviderError, ReferenceDataProvider, TRAILING_PE,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const FUNDAMENTALS_FILE: &str = "fundamentals.csv";
const PE_HEADERS: [&str; 4] = ["trailingPE", "TrailingPE", "Trailing PE", "P/E Ratio"];

/// Offline provider backed by a directory of CSV downloads.
///
/// Prices are read from `<dir>/<TICKER>.csv`. Both the single-header layout
/// (`Date,Open,High,Low,Close,Adj Close,Volume`) and the multi-header layout
/// written by multi-ticker download tools are accepted:
///
/// ```text
/// Price,Adj Close,Close,High,Low,Open,Volume
/// Ticker,AAPL,AAPL,AAPL,AAPL,AAPL,AAPL
/// Date,,,,,,
/// 2020-01-02,72.71,75.08,75.15,73.79,74.05,135480400
/// ```
///
/// Fundamentals come from `<dir>/fundamentals.csv` with a `Ticker` column.
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn price_path(&self, ticker: &str) -> Result<PathBuf, PriceProviderError> {
        if ticker.is_empty() || ticker.contains(['/', '\\']) || ticker.contains("..") {
            return Err(PriceProviderError::NotFound);
        }
        Ok(self.dir.join(format!("{}.csv", ticker)))
    }
}

async fn read_file(path: &Path) -> Result<String, PriceProviderError> {
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PriceProviderError::NotFound,
        _ => PriceProviderError::BadResponse(format!("{}: {}", path.display(), e)),
    })
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    // Timestamps such as "2020-01-02 00:00:00-05:00" keep only the date part
    let cell = cell.trim();
    NaiveDate::parse_from_str(cell.get(..10).unwrap_or(cell), "%Y-%m-%d").ok()
}

fn parse_cell(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<f64>().ok())
}

/// Parse a price CSV into a frame, keeping multi-row headers as compound labels.
pub fn parse_price_csv(content: &str) -> Result<PriceFrame, PriceProviderError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, _>>()
        .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

    let first_data = records
        .iter()
        .position(|r| r.get(0).and_then(parse_date).is_some())
        .unwrap_or(records.len());

    // A row like "Date,,,,,," only names the index
    let header_rows: Vec<&StringRecord> = records[..first_data]
        .iter()
        .filter(|r| r.iter().skip(1).any(|c| !c.trim().is_empty()))
        .collect();

    if header_rows.is_empty() {
        return Err(PriceProviderError::Parse("missing header row".into()));
    }

    let width = header_rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let labels: Vec<ColumnLabel> = (1..width)
        .map(|j| {
            if header_rows.len() == 1 {
                ColumnLabel::Flat(header_rows[0].get(j).unwrap_or("").trim().to_string())
            } else {
                ColumnLabel::Compound(
                    header_rows
                        .iter()
                        .map(|r| r.get(j).unwrap_or("").trim().to_string())
                        .collect(),
                )
            }
        })
        .collect();

    let mut dates = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); labels.len()];

    for record in &records[first_data..] {
        let Some(date) = record.get(0).and_then(parse_date) else { continue };
        dates.push(date);
        for (j, column) in columns.iter_mut().enumerate() {
            column.push(parse_cell(record.get(j + 1)));
        }
    }

    Ok(labels
        .into_iter()
        .zip(columns)
        .fold(PriceFrame::new(dates), |frame, (label, values)| frame.with_column(label, values)))
}

/// Parse a fundamentals CSV and return the row for `ticker`, if any.
pub fn parse_fundamentals_csv(content: &str, ticker: &str) -> Result<Option<Fundamentals>, PriceProviderError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| PriceProviderError::Parse(e.to_string()))?
        .clone();

    let ticker_idx = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ticker") || h.trim().eq_ignore_ascii_case("symbol"))
        .ok_or_else(|| PriceProviderError::Parse("fundamentals file has no Ticker column".into()))?;

    for record in reader.records() {
        let record = record.map_err(|e| PriceProviderError::Parse(e.to_string()))?;
        if !record.get(ticker_idx).is_some_and(|t| t.trim().eq_ignore_ascii_case(ticker)) {
            continue;
        }

        let mut fields = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            fields.insert(header.trim().to_string(), Value::String(cell.trim().to_string()));
        }

        let pe = PE_HEADERS.iter().find_map(|h| fields.get(*h).cloned());
        let mut fundamentals = Fundamentals::new(fields);
        if let Some(pe) = pe {
            fundamentals.insert(TRAILING_PE, pe);
        }
        return Ok(Some(fundamentals));
    }

    Ok(None)
}

#[async_trait]
impl PriceProvider for CsvDirProvider {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, PriceProviderError> {
        let content = read_file(&self.price_path(ticker)?).await?;
        let frame = parse_price_csv(&content)?;

        // Trim to the requested window, keeping columns aligned
        let keep: Vec<bool> = frame.dates.iter().map(|d| *d >= start && *d < end).collect();
        let dates = frame
            .dates
            .iter()
            .zip(&keep)
            .filter_map(|(d, k)| k.then_some(*d))
            .collect();

        Ok(frame.columns.into_iter().fold(PriceFrame::new(dates), |out, column| {
            let values = column
                .values
                .into_iter()
                .zip(&keep)
                .filter_map(|(v, k)| k.then_some(v))
                .collect();
            out.with_column(column.label, values)
        }))
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

#[async_trait]
impl ReferenceDataProvider for CsvDirProvider {
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, PriceProviderError> {
        let content = read_file(&self.dir.join(FUNDAMENTALS_FILE)).await?;
        parse_fundamentals_csv(&content, ticker)?.ok_or(PriceProviderError::NotFound)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
