use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::external::price_frame::PriceFrame;

/// Canonical key for the trailing price/earnings ratio inside [`Fundamentals`].
pub const TRAILING_PE: &str = "trailingPE";

#[derive(Debug, Error)]
pub enum PriceProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("not found")]
    NotFound,

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("missing API key: {0} not set")]
    MissingApiKey(&'static str),
}

impl PriceProviderError {
    /// Short label used in log lines, so a transient failure can be told apart
    /// from a genuine data gap even though both end up as "No Data".
    pub fn kind(&self) -> &'static str {
        match self {
            PriceProviderError::Network(_) => "network",
            PriceProviderError::BadResponse(_) => "bad_response",
            PriceProviderError::Parse(_) => "parse",
            PriceProviderError::RateLimited => "rate_limited",
            PriceProviderError::NotFound => "not_found",
            PriceProviderError::Timeout(_) => "timeout",
            PriceProviderError::MissingApiKey(_) => "missing_api_key",
        }
    }
}

/// Key-value bag of fundamentals returned by a reference-data snapshot.
///
/// Providers store what they receive under their own keys and copy the
/// trailing P/E under [`TRAILING_PE`]. Values may be JSON numbers, numeric
/// strings, or Yahoo-style `{"raw": .., "fmt": ..}` objects.
#[derive(Debug, Clone, Default)]
pub struct Fundamentals {
    fields: Map<String, Value>,
}

impl Fundamentals {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Numeric view of a field. Placeholders such as `"None"` or `"-"` read as absent.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        let value = match self.fields.get(key)? {
            Value::Object(obj) => obj.get("raw")?,
            other => other,
        };

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;

        parsed.is_finite().then_some(parsed)
    }

    pub fn trailing_pe(&self) -> Option<f64> {
        self.get_f64(TRAILING_PE)
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Daily rows for `ticker` with dates in `[start, end)`.
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, PriceProviderError>;

    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ReferenceDataProvider: Send + Sync {
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, PriceProviderError>;

    fn name(&self) -> &'static str;
}
