use serde::{Deserialize, Serialize};

use crate::models::metric_record::{MetricRecord, TickerMetrics};

/// Acceptance criteria for the "steady performers" view.
///
/// All values are percentages except the P/E band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Volatility ceiling (e.g., 25.0 for 25%)
    pub max_volatility: f64,

    /// CAGR floor (e.g., 5.0 for 5%)
    pub min_cagr: f64,

    /// Inclusive trailing P/E band `(low, high)`
    pub pe_band: (f64, f64),
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_volatility: 25.0,
            min_cagr: 5.0,
            pe_band: (10.0, 30.0),
        }
    }
}

impl Thresholds {
    /// Missing P/E fails the band check.
    pub fn accepts(&self, metrics: &TickerMetrics) -> bool {
        let (low, high) = self.pe_band;
        metrics.volatility <= self.max_volatility
            && metrics.cagr >= self.min_cagr
            && metrics.pe_ratio.is_some_and(|pe| pe >= low && pe <= high)
    }
}

/// Every analyzed ticker, in request order, including error rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub records: Vec<MetricRecord>,
}

impl ResultTable {
    pub fn new(records: Vec<MetricRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Records passing [`Thresholds`], sorted by CAGR descending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredTable {
    pub records: Vec<MetricRecord>,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub results: ResultTable,
    pub filtered: FilteredTable,
}

impl Report {
    /// False when no ticker produced metrics.
    pub fn has_data(&self) -> bool {
        self.results.records.iter().any(|r| !r.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(cagr: f64, volatility: f64, pe_ratio: Option<f64>) -> TickerMetrics {
        TickerMetrics { cagr, volatility, max_drawdown: -10.0, pe_ratio }
    }

    #[test]
    fn test_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.max_volatility, 25.0);
        assert_eq!(t.min_cagr, 5.0);
        assert_eq!(t.pe_band, (10.0, 30.0));
    }

    #[test]
    fn test_accepts_bounds_inclusive() {
        let t = Thresholds::default();
        assert!(t.accepts(&metrics(5.0, 25.0, Some(10.0))));
        assert!(t.accepts(&metrics(5.0, 25.0, Some(30.0))));
    }

    #[test]
    fn test_rejects_each_failed_condition() {
        let t = Thresholds::default();
        assert!(!t.accepts(&metrics(4.99, 20.0, Some(20.0))));
        assert!(!t.accepts(&metrics(10.0, 25.01, Some(20.0))));
        assert!(!t.accepts(&metrics(10.0, 20.0, Some(9.99))));
        assert!(!t.accepts(&metrics(10.0, 20.0, Some(30.01))));
    }

    #[test]
    fn test_missing_pe_fails_closed() {
        assert!(!Thresholds::default().accepts(&metrics(10.0, 20.0, None)));
    }
}
