use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary metrics for a ticker with usable price history.
///
/// All values are percentages except `pe_ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerMetrics {
    /// Compound annual growth rate, as a percentage
    pub cagr: f64,

    /// Annualized standard deviation of daily returns, as a percentage
    pub volatility: f64,

    /// Largest peak-to-trough decline, as a non-positive percentage
    pub max_drawdown: f64,

    /// Trailing price/earnings ratio, when the provider had one
    pub pe_ratio: Option<f64>,
}

/// Why a ticker has no metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordError {
    /// No usable price history (empty response, missing adjusted close, or provider failure)
    NoData,
    /// Price history exists but is too short for a metric to be defined
    InsufficientData,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::NoData => write!(f, "No Data"),
            RecordError::InsufficientData => write!(f, "Insufficient Data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Metrics(TickerMetrics),
    Error(RecordError),
}

/// One row of the result table. Either metrics or an error marker, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub ticker: String,
    pub outcome: RecordOutcome,
}

impl MetricRecord {
    pub fn with_metrics(ticker: impl Into<String>, metrics: TickerMetrics) -> Self {
        Self {
            ticker: ticker.into(),
            outcome: RecordOutcome::Metrics(metrics),
        }
    }

    pub fn with_error(ticker: impl Into<String>, error: RecordError) -> Self {
        Self {
            ticker: ticker.into(),
            outcome: RecordOutcome::Error(error),
        }
    }

    pub fn metrics(&self) -> Option<&TickerMetrics> {
        match &self.outcome {
            RecordOutcome::Metrics(m) => Some(m),
            RecordOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<RecordError> {
        match self.outcome {
            RecordOutcome::Metrics(_) => None,
            RecordOutcome::Error(e) => Some(e),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_marker_excludes_metrics() {
        let record = MetricRecord::with_error("X", RecordError::NoData);
        assert!(record.is_error());
        assert!(record.metrics().is_none());
        assert_eq!(record.error().unwrap().to_string(), "No Data");
    }

    #[test]
    fn test_metrics_exclude_error_marker() {
        let record = MetricRecord::with_metrics(
            "AAPL",
            TickerMetrics { cagr: 12.5, volatility: 20.0, max_drawdown: -15.0, pe_ratio: None },
        );
        assert!(!record.is_error());
        assert_eq!(record.metrics().unwrap().cagr, 12.5);
    }
}
