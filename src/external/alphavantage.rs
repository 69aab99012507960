use crate::external::price_frame::{ColumnLabel, PriceFrame, ADJ_CLOSE};
use crate::external::price_provider::{
    Fundamentals, PriceProvider, PriceProviderError, ReferenceDataProvider, TRAILING_PE,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn from_env(timeout: Duration) -> Result<Self, PriceProviderError> {
        let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
            .map_err(|_| PriceProviderError::MissingApiKey("ALPHAVANTAGE_API_KEY"))?;

        Ok(Self::new(api_key, timeout, DEFAULT_BASE_URL))
    }

    pub fn new(api_key: String, timeout: Duration, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn query<T: for<'de> Deserialize<'de>>(
        &self,
        function: &str,
        ticker: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, PriceProviderError> {
        let url = format!("{}/query", self.base_url);

        let mut params = vec![
            ("function", function),
            ("symbol", ticker),
            ("apikey", self.api_key.as_str()),
        ];
        params.extend_from_slice(extra);

        let resp = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PriceProviderError::BadResponse(format!("HTTP {}", resp.status())));
        }

        resp.json::<T>()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct AvDailyAdjustedResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<BTreeMap<String, AvDailyBar>>,

    // Throttle responses look like:
    // { "Note": "Thank you for using Alpha Vantage! ... 5 calls per minute ..." }
    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Information")]
    information: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvDailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
    #[serde(rename = "6. volume")]
    volume: String,
}

fn parse_cell(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, PriceProviderError> {
        // compact returns the latest ~100 points, full the whole history
        let outputsize = if (end - start).num_days() <= 100 { "compact" } else { "full" };

        let body: AvDailyAdjustedResponse = self
            .query("TIME_SERIES_DAILY_ADJUSTED", ticker, &[("outputsize", outputsize)])
            .await?;

        if body.note.is_some() {
            return Err(PriceProviderError::RateLimited);
        }

        if let Some(msg) = body.error_message {
            return Err(PriceProviderError::BadResponse(msg));
        }

        if let Some(msg) = body.information {
            return Err(PriceProviderError::BadResponse(msg));
        }

        let series = body.time_series.ok_or(PriceProviderError::NotFound)?;

        // BTreeMap keyed by "YYYY-MM-DD" iterates ascending
        let mut dates = Vec::with_capacity(series.len());
        let (mut open, mut high, mut low, mut close, mut adj, mut volume) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        let mut any_adjusted = false;

        for (date_str, bar) in series {
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

            if date < start || date >= end {
                continue;
            }

            let adjusted = bar.adjusted_close.as_deref().and_then(parse_cell);
            any_adjusted |= bar.adjusted_close.is_some();

            dates.push(date);
            open.push(parse_cell(&bar.open));
            high.push(parse_cell(&bar.high));
            low.push(parse_cell(&bar.low));
            close.push(parse_cell(&bar.close));
            adj.push(adjusted);
            volume.push(parse_cell(&bar.volume));
        }

        let mut frame = PriceFrame::new(dates)
            .with_column(ColumnLabel::Flat("Open".into()), open)
            .with_column(ColumnLabel::Flat("High".into()), high)
            .with_column(ColumnLabel::Flat("Low".into()), low)
            .with_column(ColumnLabel::Flat("Close".into()), close);

        if any_adjusted {
            frame = frame.with_column(ColumnLabel::Flat(ADJ_CLOSE.into()), adj);
        }

        Ok(frame.with_column(ColumnLabel::Flat("Volume".into()), volume))
    }

    fn name(&self) -> &'static str {
        "alphavantage"
    }
}

#[async_trait]
impl ReferenceDataProvider for AlphaVantageProvider {
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, PriceProviderError> {
        let body: Map<String, Value> = self.query("OVERVIEW", ticker, &[]).await?;

        if body.contains_key("Note") {
            return Err(PriceProviderError::RateLimited);
        }

        if let Some(Value::String(msg)) = body.get("Error Message") {
            return Err(PriceProviderError::BadResponse(msg.clone()));
        }

        // Unknown symbols come back as an empty object
        if body.is_empty() {
            return Err(PriceProviderError::NotFound);
        }

        let trailing = body.get("TrailingPE").cloned();
        let mut fundamentals = Fundamentals::new(body);
        if let Some(value) = trailing {
            fundamentals.insert(TRAILING_PE, value);
        }

        Ok(fundamentals)
    }

    fn name(&self) -> &'static str {
        "alphavantage"
    }
}
