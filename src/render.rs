use crate::models::{MetricRecord, RecordOutcome};

const HEADERS: [&str; 5] = ["Ticker", "CAGR (%)", "Volatility (%)", "Max Drawdown (%)", "P/E Ratio"];

fn cells(record: &MetricRecord) -> [String; 5] {
    match &record.outcome {
        RecordOutcome::Metrics(m) => [
            record.ticker.clone(),
            format!("{:.2}", m.cagr),
            format!("{:.2}", m.volatility),
            format!("{:.2}", m.max_drawdown),
            m.pe_ratio.map_or_else(|| "-".to_string(), |pe| format!("{:.2}", pe)),
        ],
        RecordOutcome::Error(e) => [
            record.ticker.clone(),
            e.to_string(),
            String::new(),
            String::new(),
            String::new(),
        ],
    }
}

/// Render records as an aligned text table under `title`.
///
/// Ticker is left-aligned, the numeric columns right-aligned.
pub fn render_table(title: &str, records: &[MetricRecord]) -> String {
    let rows: Vec<[String; 5]> = records.iter().map(cells).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |row: &[String; 5]| -> String {
        let mut out = format!("{:<width$}", row[0], width = widths[0]);
        for (cell, w) in row.iter().zip(widths).skip(1) {
            out.push_str(&format!("  {:>width$}", cell, width = w));
        }
        out.trim_end().to_string()
    };

    let header = line(&HEADERS.map(String::from));
    let total = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"-".repeat(total));
    out.push('\n');
    if rows.is_empty() {
        out.push_str("(none)\n");
    }
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordError, TickerMetrics};

    fn sample() -> Vec<MetricRecord> {
        vec![
            MetricRecord::with_metrics(
                "AAPL",
                TickerMetrics { cagr: 21.5, volatility: 28.123, max_drawdown: -31.4, pe_ratio: Some(29.37) },
            ),
            MetricRecord::with_metrics(
                "MSFT",
                TickerMetrics { cagr: 18.0, volatility: 22.4, max_drawdown: -12.0, pe_ratio: None },
            ),
            MetricRecord::with_error("XYZ", RecordError::NoData),
        ]
    }

    #[test]
    fn test_table_has_title_and_headers() {
        let out = render_table("Stock Metrics", &sample());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Stock Metrics");
        for h in HEADERS {
            assert!(lines[1].contains(h));
        }
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_metric_row_formatting() {
        let out = render_table("t", &sample());
        let aapl = out.lines().find(|l| l.starts_with("AAPL")).unwrap();
        assert!(aapl.contains("21.50"));
        assert!(aapl.contains("28.12"));
        assert!(aapl.contains("-31.40"));
        assert!(aapl.ends_with("29.37"));
    }

    #[test]
    fn test_absent_pe_is_dash() {
        let out = render_table("t", &sample());
        let msft = out.lines().find(|l| l.starts_with("MSFT")).unwrap();
        assert!(msft.ends_with('-'));
    }

    #[test]
    fn test_error_row_shows_marker() {
        let out = render_table("t", &sample());
        let xyz = out.lines().find(|l| l.starts_with("XYZ")).unwrap();
        assert!(xyz.contains("No Data"));
        assert!(!xyz.contains('.'));
    }

    #[test]
    fn test_columns_align() {
        let out = render_table("t", &sample());
        let lines: Vec<&str> = out.lines().skip(3).take(2).collect();
        let end_of = |l: &str, cell: &str| l.find(cell).unwrap() + cell.len();
        assert_eq!(end_of(lines[0], "21.50"), end_of(lines[1], "18.00"));
        assert_eq!(lines[0].len(), lines[1].len());
    }

    #[test]
    fn test_insufficient_data_row_shows_marker() {
        let out = render_table("t", &[MetricRecord::with_error("NEW", RecordError::InsufficientData)]);
        let row = out.lines().nth(3).unwrap();
        assert!(row.starts_with("NEW"));
        assert!(row.ends_with("Insufficient Data"));
    }

    #[test]
    fn test_empty_table() {
        let out = render_table("Steady Performers", &[]);
        assert!(out.contains("(none)"));
    }
}
