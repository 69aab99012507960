use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily adjusted close for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adj_close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, adj_close: f64) -> Self {
        Self { date, adj_close }
    }
}

/// Ascending adjusted-close history for one ticker, with its derived
/// per-period returns and cumulative growth.
///
/// The derived vectors are built once in [`PriceSeries::new`] and only exposed
/// read-only, so growth always matches the return sequence it came from.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
    /// `returns[i]` is the return from `points[i]` to `points[i + 1]`.
    returns: Vec<f64>,
    /// `growth[0] == 1.0`, `growth[i] == growth[i - 1] * (1 + returns[i - 1])`.
    growth: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from unordered points.
    ///
    /// Non-finite and non-positive prices are dropped, points are sorted by
    /// date, and for duplicate dates the last point wins.
    pub fn new(ticker: impl Into<String>, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut points: Vec<PricePoint> = points
            .into_iter()
            .filter(|p| p.adj_close.is_finite() && p.adj_close > 0.0)
            .collect();

        // stable sort keeps input order among equal dates
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for p in points {
            match deduped.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => deduped.push(p),
            }
        }

        let returns: Vec<f64> = deduped
            .windows(2)
            .map(|w| (w[1].adj_close - w[0].adj_close) / w[0].adj_close)
            .collect();

        let mut growth = Vec::with_capacity(deduped.len());
        if !deduped.is_empty() {
            growth.push(1.0);
            for r in &returns {
                let prev = growth[growth.len() - 1];
                growth.push(prev * (1.0 + r));
            }
        }

        Self {
            ticker: ticker.into(),
            points: deduped,
            returns,
            growth,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Defined returns only, i.e. every period after the first.
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Return of period `i`; the first period has none.
    pub fn return_at(&self, i: usize) -> Option<f64> {
        i.checked_sub(1).and_then(|j| self.returns.get(j).copied())
    }

    pub fn cumulative_growth(&self) -> &[f64] {
        &self.growth
    }

    pub fn final_growth(&self) -> Option<f64> {
        self.growth.last().copied()
    }
}
