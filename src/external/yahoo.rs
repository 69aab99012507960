use crate::external::price_frame::{ColumnLabel, PriceFrame, ADJ_CLOSE};
use crate::external::price_provider::{
    Fundamentals, PriceProvider, PriceProviderError, ReferenceDataProvider,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_SUMMARY_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";

/// Yahoo Finance provider - no API key required.
///
/// Prices come from the v8 chart endpoint with adjusted closes enabled,
/// fundamentals from the v10 quoteSummary `summaryDetail` module.
///
/// quoteSummary rejects requests without a session cookie and a matching
/// crumb. The first fundamentals call visits the cookie host, reads the crumb
/// from `/v1/test/getcrumb` and reuses both for the provider's lifetime.
/// A failed handshake is retried on the next call.
pub struct YahooProvider {
    client: reqwest::Client,
    chart_url: String,
    summary_url: String,
    cookie_url: String,
    crumb: OnceCell<String>,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_urls(timeout, DEFAULT_CHART_URL, DEFAULT_SUMMARY_URL, DEFAULT_COOKIE_URL)
    }

    pub fn with_base_urls(timeout: Duration, chart_url: &str, summary_url: &str, cookie_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; StockTrendAnalyzer/0.1)")
                .cookie_store(true)
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            chart_url: chart_url.trim_end_matches('/').to_string(),
            summary_url: summary_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.trim_end_matches('/').to_string(),
            crumb: OnceCell::new(),
        }
    }

    async fn crumb(&self) -> Result<&str, PriceProviderError> {
        self.crumb
            .get_or_try_init(|| async {
                // The consent host answers 404 but still sets the session cookie
                self.client
                    .get(&self.cookie_url)
                    .send()
                    .await
                    .map_err(|e| PriceProviderError::Network(e.to_string()))?;

                let crumb = self
                    .get(&format!("{}/v1/test/getcrumb", self.summary_url), &[])
                    .await?
                    .text()
                    .await
                    .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

                let crumb = crumb.trim();
                if crumb.is_empty() || crumb.contains(' ') {
                    return Err(PriceProviderError::BadResponse(format!("unusable crumb '{}'", crumb)));
                }
                tracing::debug!("🔑 Obtained Yahoo crumb");
                Ok(crumb.to_string())
            })
            .await
            .map(String::as_str)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response, PriceProviderError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => Ok(resp),
            reqwest::StatusCode::NOT_FOUND => Err(PriceProviderError::NotFound),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(PriceProviderError::RateLimited),
            s => Err(PriceProviderError::BadResponse(format!("HTTP {}", s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    summary_detail: Option<Map<String, Value>>,
}

fn unix_seconds(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).and_utc().timestamp().to_string()
}

/// Pad or cut a column so it lines up with the timestamp index.
fn aligned(mut values: Vec<Option<f64>>, len: usize) -> Vec<Option<f64>> {
    values.resize(len, None);
    values
}

#[async_trait]
impl PriceProvider for YahooProvider {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, PriceProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.chart_url, ticker);

        let resp = self
            .get(
                &url,
                &[
                    ("period1", unix_seconds(start)),
                    ("period2", unix_seconds(end)),
                    ("interval", "1d".to_string()),
                    ("includeAdjustedClose", "true".to_string()),
                ],
            )
            .await?;

        let body: YahooChartResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.chart.error {
            if error.description.contains("No data found") {
                return Err(PriceProviderError::NotFound);
            }
            return Err(PriceProviderError::BadResponse(error.description));
        }

        let result = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
            .ok_or(PriceProviderError::NotFound)?;

        let dates = result
            .timestamp
            .iter()
            .map(|ts| {
                chrono::DateTime::from_timestamp(*ts, 0)
                    .map(|dt| dt.date_naive())
                    .ok_or_else(|| PriceProviderError::Parse(format!("bad timestamp {}", ts)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let len = dates.len();

        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
        let mut frame = PriceFrame::new(dates)
            .with_column(ColumnLabel::Flat("Open".into()), aligned(quote.open, len))
            .with_column(ColumnLabel::Flat("High".into()), aligned(quote.high, len))
            .with_column(ColumnLabel::Flat("Low".into()), aligned(quote.low, len))
            .with_column(ColumnLabel::Flat("Close".into()), aligned(quote.close, len));

        // Adjusted closes are only present when the instrument has them; leave
        // the column out otherwise so the fetcher reports the gap.
        if let Some(adj) = result.indicators.adjclose.into_iter().next() {
            frame = frame.with_column(ColumnLabel::Flat(ADJ_CLOSE.into()), aligned(adj.adjclose, len));
        }

        Ok(frame.with_column(ColumnLabel::Flat("Volume".into()), aligned(quote.volume, len)))
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

#[async_trait]
impl ReferenceDataProvider for YahooProvider {
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, PriceProviderError> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v10/finance/quoteSummary/{}", self.summary_url, ticker);

        let resp = self
            .get(
                &url,
                &[("modules", "summaryDetail".to_string()), ("crumb", crumb.to_string())],
            )
            .await?;

        let body: QuoteSummaryResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.quote_summary.error {
            return Err(PriceProviderError::BadResponse(error.description));
        }

        // summaryDetail already uses the canonical `trailingPE` key
        body.quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.summary_detail)
            .map(Fundamentals::new)
            .ok_or(PriceProviderError::NotFound)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
