use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::models::{MetricRecord, RecordError, TickerMetrics};
use crate::services::metrics_service::{self, MetricError};
use crate::services::price_service::DataFetcher;
use crate::services::reference_service::ReferenceDataFetcher;

/// What to analyze and how hard to push the upstream while doing it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub tickers: Vec<String>,
    pub lookback_years: u32,
    /// Tickers processed at the same time
    pub max_concurrent_tickers: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            lookback_years: 5,
            max_concurrent_tickers: 3,
        }
    }
}

/// Runs fetch and metric computation for each configured ticker.
pub struct Analyzer {
    config: AnalyzerConfig,
    prices: DataFetcher,
    reference: ReferenceDataFetcher,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, prices: DataFetcher, reference: ReferenceDataFetcher) -> Self {
        Self {
            config,
            prices,
            reference,
        }
    }

    /// Analyze one ticker. Never fails; problems become an error marker.
    pub async fn analyze(&self, ticker: &str) -> MetricRecord {
        let Some(series) = self.prices.fetch(ticker, self.config.lookback_years).await else {
            return MetricRecord::with_error(ticker, RecordError::NoData);
        };

        let computed = (|| -> Result<(f64, f64, f64), MetricError> {
            Ok((
                metrics_service::cagr(&series)?,
                metrics_service::volatility(&series)?,
                metrics_service::max_drawdown(&series)?,
            ))
        })();

        let (cagr, volatility, max_drawdown) = match computed {
            Ok(values) => values,
            Err(e) => {
                warn!("✗ Skipping metrics for {} ({} points): {}", ticker, series.len(), e);
                return MetricRecord::with_error(ticker, RecordError::InsufficientData);
            }
        };

        let pe_ratio = self.reference.fetch_pe(ticker).await;

        MetricRecord::with_metrics(
            ticker,
            TickerMetrics {
                cagr,
                volatility,
                max_drawdown,
                pe_ratio,
            },
        )
    }

    /// Analyze every configured ticker through a bounded pool.
    ///
    /// Output order is request order regardless of completion order.
    pub async fn analyze_all(&self) -> Vec<MetricRecord> {
        let width = self.config.max_concurrent_tickers.max(1);
        info!(
            "🔍 Analyzing {} tickers ({} years, {} at a time)",
            self.config.tickers.len(),
            self.config.lookback_years,
            width
        );

        let records: Vec<MetricRecord> = stream::iter(self.config.tickers.iter())
            .map(|ticker| self.analyze(ticker))
            .buffered(width)
            .collect()
            .await;

        let failed = records.iter().filter(|r| r.is_error()).count();
        info!(
            "✅ Analysis completed: {} analyzed, {} without data",
            records.len() - failed,
            failed
        );

        records
    }
}
